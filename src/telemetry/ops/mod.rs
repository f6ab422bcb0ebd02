pub mod scrape;
pub mod vendors;
