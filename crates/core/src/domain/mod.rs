pub mod contract;
pub mod market;
pub mod report;
pub mod request;
