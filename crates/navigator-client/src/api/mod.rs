mod chat;
mod experts;
mod models;
mod settings;
mod status;
