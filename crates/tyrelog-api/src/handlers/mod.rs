pub mod files;
mod form;
pub mod health;
pub mod invoices;
pub mod jobs;
