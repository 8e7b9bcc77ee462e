mod common;
mod identity;
mod listings;
