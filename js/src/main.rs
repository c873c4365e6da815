use promise_shim::{Context, Isolate, IsolateOptions, Persistent, Promise, PromiseResolver, Value, value_to_string};
use std::process;

#[derive(clap::Parser)]
#[command(name = "promise-shim", version, about = "Drive a promise resolver through a sequence of operations")]
struct Cli {
    /// Maximum number of live heap objects
    #[arg(long)]
    max_objects: Option<usize>,

    /// Disable script execution before the first operation
    #[arg(long)]
    disable_execution: bool,

    /// Operations to run in order: resolve:<value>, reject:<value>, gc, enable, disable
    ops: Vec<String>,
}

enum Op {
    Resolve(String),
    Reject(String),
    Gc,
    Enable,
    Disable,
}

impl std::str::FromStr for Op {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("resolve", value)) => Ok(Op::Resolve(value.to_string())),
            Some(("reject", value)) => Ok(Op::Reject(value.to_string())),
            None if s == "gc" => Ok(Op::Gc),
            None if s == "enable" => Ok(Op::Enable),
            None if s == "disable" => Ok(Op::Disable),
            _ => Err(format!("unknown operation '{}'", s)),
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Op::Resolve(v) => write!(f, "resolve({})", v),
            Op::Reject(v) => write!(f, "reject({})", v),
            Op::Gc => f.write_str("gc"),
            Op::Enable => f.write_str("enable"),
            Op::Disable => f.write_str("disable"),
        }
    }
}

fn parse_value<'gc>(text: &str) -> Value<'gc> {
    match text {
        "undefined" => Value::Undefined,
        "null" => Value::Null,
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => match text.parse::<f64>() {
            Ok(n) => Value::Number(n),
            Err(_) => Value::String(text.to_string()),
        },
    }
}

fn describe<'gc>(cx: &Context<'gc>, promise: Promise<'gc>, outcome: Option<bool>) -> String {
    let result = promise.result(cx).map(|v| value_to_string(&v)).unwrap_or_else(|| "<none>".to_string());
    let engine_state = cx
        .promise_state(&promise.object())
        .map(|s| s.to_string())
        .unwrap_or_else(|e| e.to_string());
    format!("{:?} -> state={} result={} engine={}", outcome, promise.state(cx), result, engine_state)
}

fn main() {
    let cli = <Cli as clap::Parser>::parse();

    // Initialize logger (controlled by RUST_LOG)
    env_logger::init();

    let ops = match cli.ops.iter().map(|s| s.parse::<Op>()).collect::<Result<Vec<_>, _>>() {
        Ok(ops) => ops,
        Err(e) => {
            log::error!("invalid operation list: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let mut options = IsolateOptions::default();
    if let Some(max) = cli.max_objects {
        options = options.max_objects(max);
    }
    let mut isolate = Isolate::with_options(options);
    log::debug!("running {} operations with {:?}", ops.len(), isolate.options());

    let handle = isolate.enter(|cx| PromiseResolver::new(&cx).map(|resolver| Persistent::new(&cx, resolver.as_value())));
    let Some(handle) = handle else {
        eprintln!("Error: could not create a promise resolver");
        process::exit(1);
    };

    if cli.disable_execution {
        isolate.disable_execution();
    }

    for op in &ops {
        let line = match op {
            Op::Gc => {
                isolate.collect_garbage();
                format!(
                    "{} objects, {} external, {} persistent",
                    isolate.object_count(),
                    isolate.live_external_objects(),
                    isolate.persistent_handle_count()
                )
            }
            Op::Enable => {
                isolate.enable_execution();
                "execution enabled".to_string()
            }
            Op::Disable => {
                isolate.disable_execution();
                "execution disabled".to_string()
            }
            Op::Resolve(text) | Op::Reject(text) => isolate.enter(|cx| {
                let value = match handle.get(&cx) {
                    Ok(value) => value,
                    Err(e) => {
                        log::warn!("resolver handle unavailable for {}: {}", op, e);
                        return format!("error: {}", e);
                    }
                };
                let resolver = PromiseResolver::cast(&value);
                let outcome = match op {
                    Op::Resolve(_) => resolver.resolve(&cx, parse_value(text)),
                    _ => resolver.reject(&cx, parse_value(text)),
                };
                if outcome.is_none() {
                    log::info!("{} did not settle the promise", op);
                }
                describe(&cx, resolver.get_promise(), outcome)
            }),
        };
        println!("{}: {}", op, line);
    }
}
