pub mod chart;
pub mod cli;
pub mod constants;
pub mod logging;
pub mod model;
pub mod monitor;
pub mod provider;
pub mod series;
pub mod store;
pub mod table;
pub mod worker;
