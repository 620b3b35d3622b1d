use log::{LevelFilter, Log, Metadata, Record};
use xbox_logger::HostLogger;

struct Silent;

impl Log for Silent {
    fn enabled(&self, _: &Metadata) -> bool {
        false
    }

    fn log(&self, _: &Record) {}

    fn flush(&self) {}
}

static SILENT: Silent = Silent;

#[test]
fn init_keeps_failing_after_another_logger_won() {
    log::set_logger(&SILENT).unwrap();
    assert!(HostLogger::new(LevelFilter::Trace).init().is_err());
    assert!(HostLogger::new(LevelFilter::Warn).init().is_err());
}
