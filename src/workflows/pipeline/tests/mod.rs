mod analytics;
mod common;
mod history;
mod routing;
