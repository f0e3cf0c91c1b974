pub mod error;
pub mod models;
pub mod ports;
pub mod services;

pub use error::AppointmentError;
pub use models::*;
pub use services::booking::{AppointmentBookingService, Collaborators};
