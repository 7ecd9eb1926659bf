pub mod echo;
pub mod fragment;
pub mod ordering;
pub mod strategy;
