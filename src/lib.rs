pub mod app_config;
pub mod catalog;
pub mod constants;
pub mod db;
pub mod error;
pub mod flash;
pub mod markdown;
pub mod middleware;
pub mod orm;
pub mod page;
pub mod permission;
pub mod reviews;
pub mod seed;
pub mod session;
pub mod storage;
pub mod template;
pub mod user;
pub mod web;
