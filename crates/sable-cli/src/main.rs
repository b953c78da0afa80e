mod repl;

use std::fs;
use std::path::Path;

use clap::{ArgAction, Parser, Subcommand};
use sable_core::{CompilerPipeline, ErrorMessageFormat, ObjectHeap, SourceMap, Vm, disassemble_program};

use repl::run_repl;

#[derive(Parser)]
#[command(name = "sable")]
#[command(version, about = "CLI tooling for the Sable language", long_about = None)]
struct SableCli {
    #[command(subcommand)]
    command: Option<SableCommand>,
    #[arg(short, long, action = ArgAction::SetTrue, help = "Enable debug mode for the REPL")]
    debug: bool,
}

#[derive(Subcommand)]
enum SableCommand {
    /// Compile and execute a script
    Run {
        path: String,
        #[arg(short, long, action = ArgAction::SetTrue, help = "Trace every instruction during execution")]
        debug: bool,

        #[arg(long, action = ArgAction::SetTrue, help = "Dump compiled bytecode before execution")]
        disasm: bool,

        #[arg(
            short = 'e',
            long,
            default_value = "verbose",
            help = "Error message format [possible values: minimal, compact, verbose]"
        )]
        eformat: String,
    },
    /// Parse and compile without executing, reporting diagnostics
    Check {
        path: String,

        #[arg(
            short = 'e',
            long,
            default_value = "verbose",
            help = "Error message format [possible values: minimal, compact, verbose]"
        )]
        eformat: String,
    },
}

fn main() {
    let cli = SableCli::parse();

    match cli.command {
        Some(SableCommand::Run {
            path,
            debug,
            disasm,
            eformat,
        }) => run_script(&path, debug, disasm, &eformat),
        Some(SableCommand::Check { path, eformat }) => check_path(&path, &eformat),
        None => run_repl(cli.debug),
    }
}

fn parse_error_format(eformat: &str) -> ErrorMessageFormat {
    match eformat.to_lowercase().as_str() {
        "minimal" => ErrorMessageFormat::Minimal,
        "compact" => ErrorMessageFormat::Compact,
        "verbose" => ErrorMessageFormat::Verbose,
        _ => {
            eprintln!("Invalid error format '{}'. Using verbose format.", eformat);
            ErrorMessageFormat::Verbose
        }
    }
}

fn run_script(filename: &str, debug_mode: bool, disasm: bool, eformat: &str) {
    let source = match fs::read_to_string(filename) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("Error reading file '{}': {}", filename, err);
            std::process::exit(1);
        }
    };

    let source_map = SourceMap::new(filename, source);
    let mut heap = ObjectHeap::new().set_debug(debug_mode);
    let format = parse_error_format(eformat);

    let program = match CompilerPipeline::new(source_map, &mut heap)
        .error_message_format(format)
        .run()
    {
        Ok(program) => {
            if disasm {
                disassemble_program(&heap);
            }
            program
        }
        Err(errors) => {
            for error in errors.all() {
                eprintln!("{}", error);
            }
            std::process::exit(65);
        }
    };

    match Vm::new(heap).set_debug(debug_mode).interpret(program) {
        Ok(()) => (),
        Err(error) => {
            eprintln!("{}", error);
            std::process::exit(70);
        }
    }
}

fn check_path(path: &str, eformat: &str) {
    let path_obj = Path::new(path);
    let format = parse_error_format(eformat);

    if path_obj.is_file() {
        let error_count = check_single_file(path, format);
        if error_count > 0 {
            std::process::exit(65);
        }
        println!("No errors found in '{}'.", path);
    } else if path_obj.is_dir() {
        let files = collect_sbl_files(path_obj);
        if files.is_empty() {
            println!("No .sbl files found in directory '{}'", path);
            return;
        }

        let mut total_errors = 0;
        for file in &files {
            total_errors += check_single_file(&file.to_string_lossy(), format);
        }

        if total_errors == 0 {
            println!("Successfully checked {} file(s). No errors found.", files.len());
        } else {
            println!(
                "Checked {} file(s). Found {} error(s) total.",
                files.len(),
                total_errors
            );
            std::process::exit(65);
        }
    } else {
        eprintln!("Error: '{}' is not a valid file or directory", path);
        std::process::exit(1);
    }
}

fn check_single_file(filename: &str, format: ErrorMessageFormat) -> usize {
    let source = match fs::read_to_string(filename) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("Error reading file '{}': {}", filename, err);
            return 0;
        }
    };

    let source_map = SourceMap::new(filename, source);
    let mut heap = ObjectHeap::new();

    match CompilerPipeline::new(source_map, &mut heap)
        .error_message_format(format)
        .run()
    {
        Ok(_) => 0,
        Err(errors) => {
            for error in errors.all() {
                eprintln!("{}: {}", filename, error);
            }
            errors.all().len()
        }
    }
}

fn collect_sbl_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();

    fn visit_dir(dir: &Path, files: &mut Vec<std::path::PathBuf>) {
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    visit_dir(&path, files);
                } else if path.extension().and_then(|s| s.to_str()) == Some("sbl") {
                    files.push(path);
                }
            }
        }
    }

    visit_dir(dir, &mut files);
    files.sort();
    files
}
