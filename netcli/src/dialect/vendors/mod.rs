//! Built-in vendor dialects.

pub mod cisco_ios;
pub mod ubiquiti;
