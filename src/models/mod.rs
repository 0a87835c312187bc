pub mod company;
pub mod job;
pub mod lead;
pub mod profile;
pub mod verification;
