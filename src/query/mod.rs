pub mod range_chart;
pub mod resolver;
pub mod top_pages;
