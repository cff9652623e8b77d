//! Line-oriented console presentation sink.

use vigil_core::PresentationSink;

/// Prints captions and results straight to stdout: one caption line per
/// search switch, indented lines for live hypotheses.
pub struct ConsoleSink;

impl PresentationSink for ConsoleSink {
    fn set_caption(&mut self, text: &str) {
        println!("── {text}");
    }

    fn set_result(&mut self, text: &str) {
        if !text.is_empty() {
            println!("   {text}");
        }
    }

    fn notify_transient(&mut self, text: &str) {
        println!(" » {text}");
    }

    fn report_error(&mut self, text: &str) {
        eprintln!(" ! {text}");
    }
}
