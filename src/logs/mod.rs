// Logs module - Append-only sink for the server's combined output

mod sink;

pub use sink::LogSink;
