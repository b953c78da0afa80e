use std::io::{self, BufRead, Write};

use sable_core::{CompilerPipeline, ErrorMessageFormat, ObjectHeap, SourceMap, Vm};

/// Line-at-a-time REPL. The heap and global table persist across lines, so
/// definitions from earlier inputs stay visible.
pub fn run_repl(debug_mode: bool) {
    println!("Sable REPL (ctrl-d to exit)");

    let heap = ObjectHeap::new().set_debug(debug_mode);
    let mut vm = Vm::new(heap).set_debug(debug_mode);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(_)) | None => {
                println!();
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let source_map = SourceMap::new("<repl>", line);
        let roots = vm.gather_roots();
        let program = match CompilerPipeline::new(source_map, vm.heap_mut())
            .error_message_format(ErrorMessageFormat::Compact)
            .persistent_roots(roots)
            .run()
        {
            Ok(program) => program,
            Err(errors) => {
                for error in errors.all() {
                    eprintln!("{}", error);
                }
                continue;
            }
        };

        if let Err(error) = vm.interpret(program) {
            eprintln!("{}", error);
        }
    }
}
