use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use clap::{Parser, Subcommand};
use std::collections::HashSet;

mod catalog;

#[derive(Parser, Debug)]
#[command(author, version, about = "One-off data utilities for the Som Travel table")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert the canned destination catalog, skipping names already present
    Seed {
        /// Only seed the destination with this name
        #[arg(long)]
        only: Option<String>,
    },
    /// Probe the table and print a sample of what is in it
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = aws_config::load_from_env().await;
    let client = DynamoClient::new(&config);
    let table_name = somtravel_shared::table_name();

    match args.command {
        Command::Seed { only } => seed(&client, &table_name, only.as_deref()).await,
        Command::Check => check(&client, &table_name).await,
    }
}

async fn existing_names(
    client: &DynamoClient,
    table_name: &str,
) -> Result<HashSet<String>, Box<dyn std::error::Error>> {
    let result = client
        .scan()
        .table_name(table_name)
        .filter_expression("entity_type = :type")
        .expression_attribute_values(":type", AttributeValue::S("destination".to_string()))
        .send()
        .await?;

    Ok(result
        .items()
        .iter()
        .filter_map(|item| item.get("name").and_then(|v| v.as_s().ok()).cloned())
        .collect())
}

async fn seed(
    client: &DynamoClient,
    table_name: &str,
    only: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let existing = existing_names(client, table_name).await?;
    let mut inserted = 0;
    let mut skipped = 0;

    for entry in catalog::CATALOG {
        if let Some(only) = only {
            if !entry.name.eq_ignore_ascii_case(only) {
                continue;
            }
        }
        if existing.contains(entry.name) {
            println!("Skipping {} (already present)", entry.name);
            skipped += 1;
            continue;
        }

        let destination_id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let pk = format!("DEST#{}", destination_id);

        client
            .put_item()
            .table_name(table_name)
            .item("PK", AttributeValue::S(pk.clone()))
            .item("SK", AttributeValue::S(pk))
            .item("entity_type", AttributeValue::S("destination".to_string()))
            .item("id", AttributeValue::S(destination_id))
            .item("name", AttributeValue::S(entry.name.to_string()))
            .item("description", AttributeValue::S(entry.description.to_string()))
            .item("country", AttributeValue::S(entry.country.to_string()))
            .item("city", AttributeValue::S(entry.city.to_string()))
            .item("price", AttributeValue::N(entry.price.to_string()))
            .item("image", AttributeValue::S(entry.image.to_string()))
            .item("created_at", AttributeValue::S(now))
            .send()
            .await?;

        println!("Inserted {}", entry.name);
        inserted += 1;
    }

    println!("Done: {} inserted, {} skipped", inserted, skipped);
    Ok(())
}

async fn check(
    client: &DynamoClient,
    table_name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match client.describe_table().table_name(table_name).send().await {
        Ok(output) => {
            let count = output.table().and_then(|t| t.item_count()).unwrap_or(0);
            println!("Table {} exists ({} items)", table_name, count);
        }
        Err(e) => {
            tracing::error!("describe_table failed: {:?}", e);
            println!("Table {} could not be described", table_name);
            return Err(e.into());
        }
    }

    let sample = client
        .scan()
        .table_name(table_name)
        .filter_expression("entity_type = :type")
        .expression_attribute_values(":type", AttributeValue::S("destination".to_string()))
        .limit(5)
        .send()
        .await?;

    println!("Sample destinations:");
    for item in sample.items() {
        let name = item.get("name").and_then(|v| v.as_s().ok()).map(|s| s.as_str()).unwrap_or("?");
        let city = item.get("city").and_then(|v| v.as_s().ok()).map(|s| s.as_str()).unwrap_or("?");
        let price = item.get("price").and_then(|v| v.as_n().ok()).map(|s| s.as_str()).unwrap_or("?");
        println!("  {} ({}) ${}", name, city, price);
    }

    Ok(())
}
