use serde::{Deserialize, Serialize};

// ========== USER ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// Parse a stored role string; anything unrecognized counts as a
    /// regular user, matching how missing auth metadata is treated.
    pub fn parse(value: &str) -> Role {
        match value {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub full_name: Option<String>,
    pub role: Option<String>,
}

// ========== DESTINATION ==========
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Destination {
    pub id: String,
    pub name: String,
    pub description: String,
    pub country: String,
    pub city: String,
    pub price: f64,
    pub image: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDestinationRequest {
    pub name: String,
    pub description: String,
    pub country: String,
    pub city: String,
    pub price: f64,
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDestinationRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub price: Option<f64>,
    pub image: Option<String>,
}

// ========== BOOKING ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Cancelled,
}

impl BookingStatus {
    pub fn parse(value: &str) -> Option<BookingStatus> {
        match value {
            "pending" => Some(BookingStatus::Pending),
            "approved" => Some(BookingStatus::Approved),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub destination_id: String,
    pub status: BookingStatus,
    pub booking_type: String,
    pub travelers: u32,
    pub start_date: String,
    pub end_date: Option<String>,
    pub total_price: f64,
    pub user_name: String,
    pub user_email: String,
    pub phone: Option<String>,
    pub created_at: String,
    /// Destination summary joined in for the dashboards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<DestinationSummary>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DestinationSummary {
    pub name: String,
    pub image: String,
    pub city: String,
    pub country: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub destination_id: String,
    pub booking_type: String,
    pub travelers: u32,
    pub start_date: String,
    pub end_date: Option<String>,
    pub user_name: String,
    pub user_email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: String,
}

// ========== ERROR ENVELOPE ==========
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_defaults_to_user() {
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("user"), Role::User);
        assert_eq!(Role::parse("annotator"), Role::User);
        assert_eq!(Role::parse(""), Role::User);
    }

    #[test]
    fn test_booking_status_parse() {
        assert_eq!(BookingStatus::parse("approved"), Some(BookingStatus::Approved));
        assert_eq!(BookingStatus::parse("cancelled"), Some(BookingStatus::Cancelled));
        assert_eq!(BookingStatus::parse("pending"), Some(BookingStatus::Pending));
        assert_eq!(BookingStatus::parse("done"), None);
    }

    #[test]
    fn test_role_round_trips_through_serde() {
        let json = serde_json::to_string(&Role::Admin).unwrap();
        assert_eq!(json, "\"admin\"");
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Role::Admin);
    }
}
