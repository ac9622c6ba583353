// src/models/mod.rs

pub mod average;
pub mod catalog;
pub mod enrollment;
pub mod exam;
pub mod question;
pub mod user;
