use kitlisp::environment::Binding;
use kitlisp::{Environment, Error, ParseErrorKind, Value, create_global_env, run};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // RUST_LOG=kitlisp=debug shows registrations and closure captures
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    println!("kitlisp - typed s-expressions for host toolkits");
    println!("Enter expressions like: (+ 1 2) or (time.parse-duration \"1h30m\")");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let mut env = create_global_env();

    // Callable from scripts as well, as a demonstration of typed operations
    env.register_operation::<_, (), Value>("help", || {
        print_help();
        Value::Nil
    });

    // Unfinished input accumulates until the expression is complete
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() { "kitlisp> " } else { "     ... " };
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() && pending.is_empty() {
                    continue;
                }

                if let Err(err) = rl.add_history_entry(line) {
                    tracing::warn!(%err, "could not record history entry");
                }

                if pending.is_empty() {
                    match line {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(&env);
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                }

                pending.push_str(line);
                pending.push('\n');

                match run(&pending, &mut env) {
                    Err(Error::Syntax(err)) if err.kind == ParseErrorKind::Incomplete => continue,
                    Ok(Value::Nil) => {}
                    Ok(result) => println!("{result}"),
                    Err(e) => println!("Error: {e}"),
                }
                pending.clear();
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("kitlisp REPL:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Values:");
    println!("  Numbers: 42, -5, 2.5     Strings: \"text\"     Characters: 'c'");
    println!("  Booleans: true, false    Nil: nil            Quotes: 'name, '(1 2)");
    println!();
    println!("Operations:");
    println!("  Arithmetic: + - * /  (integers widen to floats when mixed)");
    println!("  Comparison: < <= > >= == != cmp, plus option variants <? ==? ...");
    println!("  Logic: and, or, not, if");
    println!("  Binding: let, var, set, lambda");
    println!("  Toolkits: time.now, time.from-unix, time.parse-time, time.parse-duration");
    println!();
    println!("Type annotations:");
    println!("  name::int, name::string?, name::[]int, name::map[string]int");
    println!();
    println!("Examples:");
    println!("  (var square (lambda (x::int) (* x x)))");
    println!("  (square 12)");
    println!("  ((lambda (first ...) (list first ...)) 1 2 3)");
    println!("  (cmp '(1 2) '(1 3))");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate native callables from everything scripts defined
    let mut natives = Vec::new();
    let mut toolkits = Vec::new();
    let mut user_defined = Vec::new();

    for (name, binding) in bindings {
        match binding {
            Binding::Value(Value::Native(_)) => natives.push(name),
            Binding::Toolkit(toolkit) => {
                let members = toolkit.members().join(", ");
                toolkits.push(format!("{name}: {members}"));
            }
            Binding::Value(value) => user_defined.push(format!("{name} = {value}")),
            Binding::Var(handle) => {
                let value = env.var(handle).map_or_else(|| "?".to_owned(), Value::to_string);
                let ty = env
                    .var_descriptor(handle)
                    .map_or_else(String::new, |ty| format!("::{ty}"));
                user_defined.push(format!("{name}{ty} = {value}"));
            }
            Binding::Type(descriptor) => user_defined.push(format!("{name} : type {descriptor}")),
        }
    }

    if !natives.is_empty() {
        println!("Native functions ({}):", natives.len());
        // Print in columns for readability
        let mut col = 0;
        for name in natives {
            print!("  {name:<15}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !toolkits.is_empty() {
        println!("Toolkits ({}):", toolkits.len());
        for line in toolkits {
            println!("  {line}");
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined ({}):", user_defined.len());
        for line in user_defined {
            println!("  {line}");
        }
    }
}
