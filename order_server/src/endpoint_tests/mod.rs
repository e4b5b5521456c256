mod helpers;
mod mocks;

mod catalog;
mod orders;
mod reviews;
mod webhook;
