/// The canned destination catalog the storefront launched with. Seeding is
/// idempotent by name, so re-running the tool only adds what is missing.
pub struct CatalogEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub country: &'static str,
    pub city: &'static str,
    pub price: f64,
    pub image: &'static str,
}

pub const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        name: "Kyoto",
        description: "Kyoto is the cultural capital of Japan, famous for its classical Buddhist temples, as well as gardens, imperial palaces, Shinto shrines and traditional wooden houses.",
        country: "Japan",
        city: "Kyoto",
        price: 150.0,
        image: "https://images.unsplash.com/photo-1493976040374-85c8e12f0c0e?q=80&w=2070&auto=format&fit=crop",
    },
    CatalogEntry {
        name: "Maldives",
        description: "Experience the ultimate tropical paradise with crystal clear waters, white sandy beaches, and luxurious overwater villas.",
        country: "Maldives",
        city: "Malé Atoll",
        price: 450.0,
        image: "https://images.unsplash.com/photo-1514282401047-d79a71a590e8?q=80&w=2065&auto=format&fit=crop",
    },
    CatalogEntry {
        name: "Bali",
        description: "Tropical paradise with lush jungles, ancient temples, and vibrant culture.",
        country: "Indonesia",
        city: "Ubud",
        price: 120.0,
        image: "https://images.unsplash.com/photo-1537996194471-e657df975ab4?q=80&w=2038&auto=format&fit=crop",
    },
    CatalogEntry {
        name: "Reykjavik",
        description: "Witness the northern lights and dramatic landscapes in the land of fire and ice.",
        country: "Iceland",
        city: "Reykjavik",
        price: 250.0,
        image: "https://images.unsplash.com/photo-1476610182048-b716b8518aae?q=80&w=2159&auto=format&fit=crop",
    },
    CatalogEntry {
        name: "Santorini",
        description: "Stunning sunsets, white-washed houses, and crystal clear waters in the Aegean Sea.",
        country: "Greece",
        city: "Oia",
        price: 300.0,
        image: "https://images.unsplash.com/photo-1570077188670-e3a8d69ac5ff?q=80&w=2072&auto=format&fit=crop",
    },
    CatalogEntry {
        name: "Bora Bora",
        description: "A small South Pacific island northwest of Tahiti in French Polynesia, surrounded by sand-fringed islets and a turquoise lagoon protected by a coral reef.",
        country: "French Polynesia",
        city: "Vaitape",
        price: 800.0,
        image: "https://images.unsplash.com/photo-1537905569824-f89f14cceb68?q=80&w=1998&auto=format&fit=crop",
    },
    CatalogEntry {
        name: "Machu Picchu",
        description: "Iconic Incan citadel set high in the Andes Mountains in Peru.",
        country: "Peru",
        city: "Cusco Region",
        price: 200.0,
        image: "https://images.unsplash.com/photo-1526392060635-9d6019884377?q=80&w=2070&auto=format&fit=crop",
    },
    CatalogEntry {
        name: "New York City",
        description: "The City That Never Sleeps, featuring iconic landmarks, world-class museums, and diverse culture.",
        country: "USA",
        city: "New York",
        price: 350.0,
        image: "https://images.unsplash.com/photo-1496417263034-38ec4f0d6b21?q=80&w=2070&auto=format&fit=crop",
    },
    CatalogEntry {
        name: "Paris",
        description: "The City of Light, known for its cafe culture, Eiffel Tower, and Louvre Museum.",
        country: "France",
        city: "Paris",
        price: 300.0,
        image: "https://images.unsplash.com/photo-1551882547-ff40c63fe5fa?q=80&w=2070&auto=format&fit=crop",
    },
    CatalogEntry {
        name: "Switzerland",
        description: "Experience the breathtaking beauty of the Swiss Alps, where snow-capped peaks meet crystal-clear lakes and charming mountain villages.",
        country: "Switzerland",
        city: "Zermatt",
        price: 400.0,
        image: "https://images.pexels.com/photos/34192225/pexels-photo-34192225.jpeg",
    },
    CatalogEntry {
        name: "Dubai",
        description: "Discover the city of the future, where ultra-modern skyscrapers meet traditional souks and golden desert dunes.",
        country: "United Arab Emirates",
        city: "Dubai",
        price: 500.0,
        image: "https://images.pexels.com/photos/2086765/pexels-photo-2086765.jpeg",
    },
    CatalogEntry {
        name: "Somalia",
        description: "Discover the hidden gem of the Horn of Africa, where pristine white beaches meet rich history and vibrant culture in a land of resilience and beauty.",
        country: "Somalia",
        city: "Mogadishu",
        price: 200.0,
        image: "https://images.pexels.com/photos/2087391/pexels-photo-2087391.jpeg",
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_names_are_unique() {
        let names: HashSet<&str> = CATALOG.iter().map(|d| d.name).collect();
        assert_eq!(names.len(), CATALOG.len());
    }

    #[test]
    fn test_catalog_entries_are_complete() {
        for entry in CATALOG {
            assert!(!entry.name.is_empty());
            assert!(!entry.description.is_empty());
            assert!(!entry.country.is_empty());
            assert!(!entry.city.is_empty());
            assert!(entry.price > 0.0);
            assert!(entry.image.starts_with("https://"));
        }
    }
}
