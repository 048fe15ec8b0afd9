mod helpers;
mod lifecycle;
mod mocks;
mod orders;
mod webhooks;
