pub mod db;

pub use db::{seed_resources, TestDb};
