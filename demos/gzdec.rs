use std::{env, fs, io::{self, Write}, cell::RefCell};

use stream_gzdec::{Dispatcher, Flow, InputUnit, UnitMetadata};
use tracing_subscriber::EnvFilter;

// Usage: gzdec <input file> [application/x-gzip | application/x-bzip2] > out
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let path = args.next().expect("missing input file");
    let tag = args.next().unwrap_or_else(|| "application/x-gzip".to_owned());

    let archive = fs::read(&path).unwrap();
    let stdout = RefCell::new(io::stdout().lock());

    let mut dispatcher = Dispatcher::new();
    dispatcher.set_callback(|unit| {
        let mut stdout = stdout.borrow_mut();
        for chunk in unit.chunks() {
            stdout.write_all(chunk)?;
        }

        Ok(())
    });
    dispatcher.set_format(&tag).unwrap();

    let mut offset = 0;
    for piece in archive.chunks(16 * 1024) {
        let metadata = UnitMetadata::new(None, Some(offset));
        offset += piece.len() as u64;

        let decoded = dispatcher.update(InputUnit::new(piece).with_metadata(metadata)).unwrap();
        if decoded.flow == Flow::EndOfStream {
            eprintln!("End of stream after {} bytes", dispatcher.session().total_out());
            break;
        }
    }

    drop(dispatcher);
    stdout.borrow_mut().flush().unwrap();
}
