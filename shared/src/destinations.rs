use crate::types::{CreateDestinationRequest, Destination, UpdateDestinationRequest};
use crate::{error_response, json_response};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::{http::StatusCode, Body, Error, Response};
use std::collections::HashMap;

fn destination_pk(id: &str) -> String {
    format!("DEST#{}", id)
}

fn item_to_destination(item: &HashMap<String, AttributeValue>) -> Option<Destination> {
    let id = item.get("id").and_then(|v| v.as_s().ok())?.to_string();
    Some(Destination {
        id,
        name: item.get("name").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        description: item.get("description").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        country: item.get("country").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        city: item.get("city").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        price: item
            .get("price")
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse::<f64>().ok())
            .unwrap_or(0.0),
        image: item.get("image").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        created_at: item.get("created_at").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
    })
}

/// Case-insensitive substring match on the fields the search box covers.
pub fn matches_query(destination: &Destination, query: &str) -> bool {
    let query = query.to_lowercase();
    destination.name.to_lowercase().contains(&query)
        || destination.country.to_lowercase().contains(&query)
        || destination.city.to_lowercase().contains(&query)
}

async fn scan_destinations(
    client: &DynamoClient,
    table_name: &str,
) -> Result<Vec<Destination>, Error> {
    let result = client
        .scan()
        .table_name(table_name)
        .filter_expression("entity_type = :type")
        .expression_attribute_values(":type", AttributeValue::S("destination".to_string()))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to scan destinations: {:?}", e);
            format!("Failed to scan destinations: {}", e)
        })?;

    let mut destinations: Vec<Destination> = result
        .items()
        .iter()
        .filter_map(item_to_destination)
        .collect();
    // Newest first, like the storefront listing.
    destinations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(destinations)
}

/// List all destinations, newest first
pub async fn list_destinations(
    client: &DynamoClient,
    table_name: &str,
) -> Result<Response<Body>, Error> {
    let destinations = scan_destinations(client, table_name).await?;
    json_response(StatusCode::OK, &destinations)
}

/// Search destinations by name, country or city
pub async fn search_destinations(
    client: &DynamoClient,
    table_name: &str,
    query: &str,
) -> Result<Response<Body>, Error> {
    let destinations = scan_destinations(client, table_name).await?;
    let matches: Vec<Destination> = destinations
        .into_iter()
        .filter(|d| matches_query(d, query))
        .collect();
    json_response(StatusCode::OK, &matches)
}

/// Get a single destination
pub async fn get_destination(
    client: &DynamoClient,
    table_name: &str,
    destination_id: &str,
) -> Result<Response<Body>, Error> {
    let pk = destination_pk(destination_id);

    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to get destination {}: {:?}", destination_id, e);
            format!("Failed to get destination: {}", e)
        })?;

    match result.item().and_then(item_to_destination) {
        Some(destination) => json_response(StatusCode::OK, &destination),
        None => error_response(StatusCode::NOT_FOUND, "NotFound", "Destination not found"),
    }
}

/// Fetch a destination without the HTTP wrapping; used when other records
/// need to join against it.
pub async fn fetch_destination(
    client: &DynamoClient,
    table_name: &str,
    destination_id: &str,
) -> Option<Destination> {
    let pk = destination_pk(destination_id);
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await;

    match result {
        Ok(output) => output.item().and_then(item_to_destination),
        Err(e) => {
            tracing::error!("Failed to fetch destination {}: {:?}", destination_id, e);
            None
        }
    }
}

/// Create a destination (admin)
pub async fn create_destination(
    client: &DynamoClient,
    table_name: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: CreateDestinationRequest = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("Invalid destination payload: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                &format!("Invalid request body: {}", e),
            );
        }
    };

    let destination_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let pk = destination_pk(&destination_id);

    client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(pk.clone()))
        .item("SK", AttributeValue::S(pk))
        .item("entity_type", AttributeValue::S("destination".to_string()))
        .item("id", AttributeValue::S(destination_id.clone()))
        .item("name", AttributeValue::S(req.name.clone()))
        .item("description", AttributeValue::S(req.description.clone()))
        .item("country", AttributeValue::S(req.country.clone()))
        .item("city", AttributeValue::S(req.city.clone()))
        .item("price", AttributeValue::N(req.price.to_string()))
        .item("image", AttributeValue::S(req.image.clone()))
        .item("created_at", AttributeValue::S(now.clone()))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to create destination: {:?}", e);
            format!("Failed to create destination: {}", e)
        })?;

    let destination = Destination {
        id: destination_id,
        name: req.name,
        description: req.description,
        country: req.country,
        city: req.city,
        price: req.price,
        image: req.image,
        created_at: now,
    };

    json_response(StatusCode::CREATED, &destination)
}

/// Partial update of a destination (admin)
pub async fn update_destination(
    client: &DynamoClient,
    table_name: &str,
    destination_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: UpdateDestinationRequest = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("Invalid destination payload: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                &format!("Invalid request body: {}", e),
            );
        }
    };

    let mut update_expr = vec![];
    let mut expr_names = HashMap::new();
    let mut expr_values = HashMap::new();

    if let Some(name) = req.name {
        update_expr.push("#name = :name");
        expr_names.insert("#name".to_string(), "name".to_string());
        expr_values.insert(":name".to_string(), AttributeValue::S(name));
    }
    if let Some(description) = req.description {
        update_expr.push("description = :description");
        expr_values.insert(":description".to_string(), AttributeValue::S(description));
    }
    if let Some(country) = req.country {
        update_expr.push("country = :country");
        expr_values.insert(":country".to_string(), AttributeValue::S(country));
    }
    if let Some(city) = req.city {
        update_expr.push("city = :city");
        expr_values.insert(":city".to_string(), AttributeValue::S(city));
    }
    if let Some(price) = req.price {
        update_expr.push("price = :price");
        expr_values.insert(":price".to_string(), AttributeValue::N(price.to_string()));
    }
    if let Some(image) = req.image {
        update_expr.push("image = :image");
        expr_values.insert(":image".to_string(), AttributeValue::S(image));
    }

    if !update_expr.is_empty() {
        let pk = destination_pk(destination_id);
        let mut builder = client
            .update_item()
            .table_name(table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .update_expression(format!("SET {}", update_expr.join(", ")));

        for (k, v) in expr_names {
            builder = builder.expression_attribute_names(k, v);
        }
        for (k, v) in expr_values {
            builder = builder.expression_attribute_values(k, v);
        }

        builder.send().await.map_err(|e| {
            tracing::error!("Failed to update destination {}: {:?}", destination_id, e);
            format!("Failed to update destination: {}", e)
        })?;
    }

    get_destination(client, table_name, destination_id).await
}

/// Delete a destination (admin)
pub async fn delete_destination(
    client: &DynamoClient,
    table_name: &str,
    destination_id: &str,
) -> Result<Response<Body>, Error> {
    let pk = destination_pk(destination_id);

    client
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete destination {}: {:?}", destination_id, e);
            format!("Failed to delete destination: {}", e)
        })?;

    json_response(StatusCode::OK, &serde_json::json!({ "message": "Destination deleted" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destination(name: &str, country: &str, city: &str) -> Destination {
        Destination {
            id: "d-1".to_string(),
            name: name.to_string(),
            description: String::new(),
            country: country.to_string(),
            city: city.to_string(),
            price: 200.0,
            image: String::new(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_matches_query_is_case_insensitive() {
        let dest = destination("Mogadishu Beaches", "Somalia", "Mogadishu");
        assert!(matches_query(&dest, "mogadishu"));
        assert!(matches_query(&dest, "SOMALIA"));
        assert!(matches_query(&dest, "beach"));
        assert!(!matches_query(&dest, "kyoto"));
    }

    #[test]
    fn test_matches_query_covers_city() {
        let dest = destination("Alpine Escape", "Switzerland", "Zermatt");
        assert!(matches_query(&dest, "zermatt"));
    }
}
