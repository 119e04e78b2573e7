pub mod drug;
pub mod report;
pub mod request;
