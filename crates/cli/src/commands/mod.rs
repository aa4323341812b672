pub mod analyze;
pub mod export;
pub mod inspect;
pub mod persistence;
pub mod resume;
pub mod run;
