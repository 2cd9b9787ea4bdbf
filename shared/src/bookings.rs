use crate::destinations::fetch_destination;
use crate::types::{
    Booking, BookingStatus, CreateBookingRequest, DestinationSummary, UpdateBookingStatusRequest,
    User,
};
use crate::{error_response, json_response};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::{http::StatusCode, Body, Error, Response};
use std::collections::HashMap;

fn booking_pk(id: &str) -> String {
    format!("BOOKING#{}", id)
}

fn user_pk(id: &str) -> String {
    format!("USER#{}", id)
}

/// Price charged for a booking: destination price per traveler.
pub fn compute_total(price_per_traveler: f64, travelers: u32) -> f64 {
    price_per_traveler * travelers as f64
}

fn item_to_booking(item: &HashMap<String, AttributeValue>) -> Option<Booking> {
    let id = item.get("id").and_then(|v| v.as_s().ok())?.to_string();
    let status = item
        .get("status")
        .and_then(|v| v.as_s().ok())
        .and_then(|s| BookingStatus::parse(s))
        .unwrap_or(BookingStatus::Pending);
    Some(Booking {
        id,
        user_id: item.get("user_id").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        destination_id: item.get("destination_id").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        status,
        booking_type: item.get("booking_type").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        travelers: item
            .get("travelers")
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(1),
        start_date: item.get("start_date").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        end_date: item.get("end_date").and_then(|v| v.as_s().ok()).map(|s| s.to_string()),
        total_price: item
            .get("total_price")
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse::<f64>().ok())
            .unwrap_or(0.0),
        user_name: item.get("user_name").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        user_email: item.get("user_email").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        phone: item.get("phone").and_then(|v| v.as_s().ok()).map(|s| s.to_string()),
        created_at: item.get("created_at").and_then(|v| v.as_s().ok()).map(|s| s.to_string()).unwrap_or_default(),
        destination: None,
    })
}

async fn hydrate_destinations(
    client: &DynamoClient,
    table_name: &str,
    bookings: &mut [Booking],
) {
    // One lookup per distinct destination; the lists are dashboard-sized.
    let mut cache: HashMap<String, Option<DestinationSummary>> = HashMap::new();
    for booking in bookings.iter_mut() {
        let summary = match cache.get(&booking.destination_id) {
            Some(cached) => cached.clone(),
            None => {
                let fetched = fetch_destination(client, table_name, &booking.destination_id)
                    .await
                    .map(|d| DestinationSummary {
                        name: d.name,
                        image: d.image,
                        city: d.city,
                        country: d.country,
                    });
                cache.insert(booking.destination_id.clone(), fetched.clone());
                fetched
            }
        };
        booking.destination = summary;
    }
}

/// Create a booking (any signed-in user); the price is computed server-side
/// from the destination row.
pub async fn create_booking(
    client: &DynamoClient,
    table_name: &str,
    current_user: &User,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: CreateBookingRequest = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("Invalid booking payload: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                &format!("Invalid request body: {}", e),
            );
        }
    };

    if req.travelers == 0 {
        return error_response(
            StatusCode::BAD_REQUEST,
            "InvalidRequest",
            "A booking needs at least one traveler",
        );
    }

    let destination = match fetch_destination(client, table_name, &req.destination_id).await {
        Some(destination) => destination,
        None => {
            return error_response(StatusCode::NOT_FOUND, "NotFound", "Destination not found")
        }
    };

    let booking_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let pk = booking_pk(&booking_id);
    let total_price = compute_total(destination.price, req.travelers);

    let mut put = client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(pk.clone()))
        .item("SK", AttributeValue::S(pk.clone()))
        .item("entity_type", AttributeValue::S("booking".to_string()))
        .item("id", AttributeValue::S(booking_id.clone()))
        .item("user_id", AttributeValue::S(current_user.id.clone()))
        .item("destination_id", AttributeValue::S(req.destination_id.clone()))
        .item("status", AttributeValue::S(BookingStatus::Pending.as_str().to_string()))
        .item("booking_type", AttributeValue::S(req.booking_type.clone()))
        .item("travelers", AttributeValue::N(req.travelers.to_string()))
        .item("start_date", AttributeValue::S(req.start_date.clone()))
        .item("total_price", AttributeValue::N(total_price.to_string()))
        .item("user_name", AttributeValue::S(req.user_name.clone()))
        .item("user_email", AttributeValue::S(req.user_email.clone()))
        .item("created_at", AttributeValue::S(now.clone()));

    if let Some(end_date) = &req.end_date {
        put = put.item("end_date", AttributeValue::S(end_date.clone()));
    }
    if let Some(phone) = &req.phone {
        put = put.item("phone", AttributeValue::S(phone.clone()));
    }

    put.send().await.map_err(|e| {
        tracing::error!("Failed to create booking: {:?}", e);
        format!("Failed to create booking: {}", e)
    })?;

    // USER -> BOOKING link so a user's bookings are a key query.
    client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(user_pk(&current_user.id)))
        .item("SK", AttributeValue::S(pk))
        .item("booked_at", AttributeValue::S(now.clone()))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to link booking to user: {:?}", e);
            format!("Failed to link booking to user: {}", e)
        })?;

    let booking = Booking {
        id: booking_id,
        user_id: current_user.id.clone(),
        destination_id: req.destination_id,
        status: BookingStatus::Pending,
        booking_type: req.booking_type,
        travelers: req.travelers,
        start_date: req.start_date,
        end_date: req.end_date,
        total_price,
        user_name: req.user_name,
        user_email: req.user_email,
        phone: req.phone,
        created_at: now,
        destination: Some(DestinationSummary {
            name: destination.name,
            image: destination.image,
            city: destination.city,
            country: destination.country,
        }),
    };

    json_response(StatusCode::CREATED, &booking)
}

/// List the caller's bookings, newest first, joined with destination
/// summaries for the dashboard.
pub async fn list_user_bookings(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<Response<Body>, Error> {
    let result = client
        .query()
        .table_name(table_name)
        .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
        .expression_attribute_values(":pk", AttributeValue::S(user_pk(user_id)))
        .expression_attribute_values(":sk_prefix", AttributeValue::S("BOOKING#".to_string()))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to query bookings for {}: {:?}", user_id, e);
            format!("Failed to query bookings: {}", e)
        })?;

    let mut bookings = Vec::new();
    for link in result.items() {
        let Some(sk) = link.get("SK").and_then(|v| v.as_s().ok()) else {
            continue;
        };
        let booking_id = sk.trim_start_matches("BOOKING#");
        if let Some(booking) = fetch_booking(client, table_name, booking_id).await {
            bookings.push(booking);
        }
    }

    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    hydrate_destinations(client, table_name, &mut bookings).await;
    json_response(StatusCode::OK, &bookings)
}

/// List every booking (admin), newest first, with destination summaries.
pub async fn list_all_bookings(
    client: &DynamoClient,
    table_name: &str,
) -> Result<Response<Body>, Error> {
    let result = client
        .scan()
        .table_name(table_name)
        .filter_expression("entity_type = :type")
        .expression_attribute_values(":type", AttributeValue::S("booking".to_string()))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to scan bookings: {:?}", e);
            format!("Failed to scan bookings: {}", e)
        })?;

    let mut bookings: Vec<Booking> = result.items().iter().filter_map(item_to_booking).collect();
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    hydrate_destinations(client, table_name, &mut bookings).await;
    json_response(StatusCode::OK, &bookings)
}

async fn fetch_booking(
    client: &DynamoClient,
    table_name: &str,
    booking_id: &str,
) -> Option<Booking> {
    let pk = booking_pk(booking_id);
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await;

    match result {
        Ok(output) => output.item().and_then(item_to_booking),
        Err(e) => {
            tracing::error!("Failed to fetch booking {}: {:?}", booking_id, e);
            None
        }
    }
}

/// Approve or cancel a booking (admin).
pub async fn update_booking_status(
    client: &DynamoClient,
    table_name: &str,
    booking_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: UpdateBookingStatusRequest = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("Invalid status payload: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                &format!("Invalid request body: {}", e),
            );
        }
    };

    // Only the two admin actions are valid transitions here; a booking never
    // goes back to pending.
    let status = match BookingStatus::parse(&req.status) {
        Some(BookingStatus::Approved) => BookingStatus::Approved,
        Some(BookingStatus::Cancelled) => BookingStatus::Cancelled,
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                "Status must be approved or cancelled",
            )
        }
    };

    let pk = booking_pk(booking_id);
    client
        .update_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .update_expression("SET #status = :status")
        .expression_attribute_names("#status", "status")
        .expression_attribute_values(":status", AttributeValue::S(status.as_str().to_string()))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to update booking {}: {:?}", booking_id, e);
            format!("Failed to update booking: {}", e)
        })?;

    match fetch_booking(client, table_name, booking_id).await {
        Some(mut booking) => {
            hydrate_destinations(client, table_name, std::slice::from_mut(&mut booking)).await;
            json_response(StatusCode::OK, &booking)
        }
        None => error_response(StatusCode::NOT_FOUND, "NotFound", "Booking not found"),
    }
}

/// Delete a booking and its user link (admin).
pub async fn delete_booking(
    client: &DynamoClient,
    table_name: &str,
    booking_id: &str,
) -> Result<Response<Body>, Error> {
    let pk = booking_pk(booking_id);

    // Need the owner to remove the link item too.
    let owner = fetch_booking(client, table_name, booking_id)
        .await
        .map(|b| b.user_id);

    client
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk.clone()))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete booking {}: {:?}", booking_id, e);
            format!("Failed to delete booking: {}", e)
        })?;

    if let Some(user_id) = owner {
        let _ = client
            .delete_item()
            .table_name(table_name)
            .key("PK", AttributeValue::S(user_pk(&user_id)))
            .key("SK", AttributeValue::S(pk))
            .send()
            .await;
    }

    json_response(StatusCode::OK, &serde_json::json!({ "message": "Booking deleted" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_total() {
        assert_eq!(compute_total(500.0, 1), 500.0);
        assert_eq!(compute_total(500.0, 4), 2000.0);
        assert_eq!(compute_total(149.5, 2), 299.0);
    }

    #[test]
    fn test_only_admin_transitions_accepted() {
        assert_eq!(BookingStatus::parse("approved"), Some(BookingStatus::Approved));
        assert_eq!(BookingStatus::parse("cancelled"), Some(BookingStatus::Cancelled));
        // "pending" parses as a status but is rejected as a transition target
        // by update_booking_status.
        assert!(matches!(
            BookingStatus::parse("pending"),
            Some(BookingStatus::Pending)
        ));
    }
}
