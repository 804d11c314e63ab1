// Session module - The controller that owns the active timeline

pub mod controller;

pub use controller::{
    Collaborators, DownloadReport, DownloadedFile, GenerationOutcome, GenerationTicket,
    SessionController,
};
