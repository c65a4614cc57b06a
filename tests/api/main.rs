mod cart;
mod health_check;
mod help;
mod helpers;
mod payment;
