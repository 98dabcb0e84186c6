mod helpers;
mod workflow;
