pub mod broker;
pub mod config;
pub mod error;
pub mod event;
pub mod indicator;
pub mod manual;
pub mod market;
pub mod model;
pub mod order_store;
pub mod risk_module;
pub mod strategy;
pub mod trading_loop;
