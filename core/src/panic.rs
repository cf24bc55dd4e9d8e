use lineage_core::error;
use std::{panic, process, thread};

/// Configures the panic hook to log the panic through the installed logger and exit the process
pub fn configure_panic() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let (file, line) = panic_info.location().map(|x| (x.file(), x.line())).unwrap_or(("unknown", 0));
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("Box<dyn Any>");
        let current_thread = thread::current();
        error!("thread '{}' panicked at {}:{}: {}", current_thread.name().unwrap_or("<unnamed>"), file, line, message);
        default_hook(panic_info);
        process::exit(1);
    }));
}
