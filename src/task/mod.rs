#![forbid(unsafe_code)]

pub mod alerts;
pub mod controller;
pub mod model;
pub mod storage;
pub mod view;
