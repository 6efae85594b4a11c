mod bootstrap;
mod commands;
mod gameplay;
mod geolocation;
mod loop_runner;
mod text_observer;

pub(crate) use loop_runner::run;
