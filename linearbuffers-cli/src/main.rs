//! `lbfc`: the command-line driver. Mirrors
//! `original_source/src/main.c`'s flag table, validation order, and
//! exit/cleanup behavior (§6/§9), built on `clap` instead of
//! `getopt_long`.

use std::fs::File;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use linearbuffers::codegen::c::CEmitter;
use linearbuffers::codegen::js::JsEmitter;
use linearbuffers::codegen::Emitter;
use linearbuffers::logging::{self, LogLevel};
use linearbuffers::{schema, Error, Result};

/// Schema-driven, zero-copy binary serialization code generator.
#[derive(Parser, Debug)]
#[command(name = "lbfc", about = "Generate encoder/decoder/jsonify/pretty source from a linearbuffers schema")]
struct Cli {
    /// Schema file to read.
    #[arg(short = 's', long)]
    schema: Option<String>,

    /// Output file ("stdout" and "stderr" are recognized specially).
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// Generate a pretty-printed rendering of the schema.
    #[arg(short = 'p', long, default_value = "0")]
    pretty: String,

    /// Target language: "c" or "js".
    #[arg(short = 'l', long, default_value = "c")]
    language: String,

    /// Generate encoder bindings.
    #[arg(short = 'e', long, default_value = "0")]
    encoder: String,

    /// Bundle the runtime support library into the generated encoder.
    #[arg(short = 'i', long = "encoder-include-library", default_value = "0")]
    encoder_include_library: String,

    /// Generate decoder bindings.
    #[arg(short = 'd', long, default_value = "0")]
    decoder: String,

    /// Decode scalars via memcpy instead of pointer casts.
    #[arg(short = 'm', long = "decoder-use-memcpy", default_value = "0")]
    decoder_use_memcpy: String,

    /// Generate a JSON-printing function.
    #[arg(short = 'j', long, default_value = "0")]
    jsonify: String,

    /// Override the schema's namespace.
    #[arg(short = 'n', long)]
    namespace: Option<String>,
}

/// Accepts the same truthy/falsy spellings as debug.c's flag parsing:
/// `{t,true,y,yes}` / `{f,false,n,no}` case-insensitively, else falls
/// back to C's `!!atoi(optarg)` (any other string is falsy, since
/// `atoi` on non-numeric input is 0).
fn parse_bool_like(s: &str) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" => true,
        "f" | "false" | "n" | "no" => false,
        other => other.trim().parse::<i64>().map(|v| v != 0).unwrap_or(false),
    }
}

enum Sink {
    Stdout,
    Stderr,
    File { path: String, file: File },
}

impl Sink {
    fn open(path: &str) -> Result<Sink> {
        match path {
            "stdout" => Ok(Sink::Stdout),
            "stderr" => Ok(Sink::Stderr),
            _ => {
                let _ = std::fs::remove_file(path);
                let file = File::create(path)?;
                Ok(Sink::File { path: path.to_string(), file })
            }
        }
    }

    fn write_all(&mut self, s: &str) -> Result<()> {
        match self {
            Sink::Stdout => std::io::stdout().write_all(s.as_bytes()).map_err(Error::from),
            Sink::Stderr => std::io::stderr().write_all(s.as_bytes()).map_err(Error::from),
            Sink::File { file, .. } => file.write_all(s.as_bytes()).map_err(Error::from),
        }
    }

    /// Remove the backing file, if this sink owns one. Mirrors
    /// main.c's bail-path `unlink(option_output)`.
    fn discard(&self) {
        if let Sink::File { path, .. } = self {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn emitter_for(language: &str) -> Option<Box<dyn Emitter>> {
    match language {
        "c" => Some(Box::new(CEmitter)),
        "js" => Some(Box::new(JsEmitter)),
        _ => None,
    }
}

fn run(cli: Cli) -> Result<()> {
    let level = std::env::var("LINEARBUFFERS_LOG")
        .ok()
        .and_then(|v| LogLevel::parse(&v))
        .unwrap_or(LogLevel::Error);
    logging::init(level);

    let schema_path = cli.schema.ok_or_else(|| Error::BadArgument {
        message: "schema file is invalid".into(),
    })?;
    let output_path = cli.output.ok_or_else(|| Error::BadArgument {
        message: "output file is invalid".into(),
    })?;

    let pretty = parse_bool_like(&cli.pretty);
    let encoder = parse_bool_like(&cli.encoder);
    let encoder_include_library = parse_bool_like(&cli.encoder_include_library);
    let decoder = parse_bool_like(&cli.decoder);
    let decoder_use_memcpy = parse_bool_like(&cli.decoder_use_memcpy);
    let jsonify = parse_bool_like(&cli.jsonify);

    if !pretty && !encoder && !decoder && !jsonify {
        return Err(Error::BadArgument {
            message: "nothing to generate".into(),
        });
    }
    if pretty && (encoder || decoder || jsonify) {
        return Err(Error::BadArgument {
            message: "pretty and (encoder | decoder | jsonify) are different things".into(),
        });
    }
    let emitter = emitter_for(&cli.language).ok_or_else(|| Error::BadArgument {
        message: format!("language: {} is invalid", cli.language),
    })?;

    log::debug!("reading schema from {schema_path}");
    let src = std::fs::read_to_string(&schema_path).map_err(|e| {
        log::error!("can not read schema file: {schema_path}");
        Error::from(e)
    })?;
    let mut parsed = schema::parser::parse(&src).map_err(|e| {
        log::error!("can not parse schema file: {schema_path}: {e}");
        e
    })?;
    if let Some(ns) = &cli.namespace {
        parsed.set_namespace(ns.clone());
    }

    let mut sink = Sink::open(&output_path)?;
    let result = (|| -> Result<()> {
        if pretty {
            log::info!("generating pretty output");
            sink.write_all(&emitter.emit_pretty(&parsed))?;
        }
        if encoder {
            log::info!("generating encoder for language {}", cli.language);
            sink.write_all(&emitter.emit_encoder(&parsed, encoder_include_library))?;
        }
        if decoder {
            log::info!("generating decoder for language {}", cli.language);
            sink.write_all(&emitter.emit_decoder(&parsed, decoder_use_memcpy))?;
        }
        if jsonify {
            if !decoder {
                log::info!("generating decoder for language {} (implied by jsonify)", cli.language);
                sink.write_all(&emitter.emit_decoder(&parsed, decoder_use_memcpy))?;
            }
            log::info!("generating jsonify for language {}", cli.language);
            sink.write_all(&emitter.emit_jsonify(&parsed))?;
        }
        Ok(())
    })();

    if let Err(e) = &result {
        log::error!("can not generate {}: {e}", output_path);
        sink.discard();
    }
    result
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(255)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_boolean_aliases_like_the_original_cli() {
        assert!(parse_bool_like("t"));
        assert!(parse_bool_like("YES"));
        assert!(parse_bool_like("1"));
        assert!(!parse_bool_like("f"));
        assert!(!parse_bool_like("No"));
        assert!(!parse_bool_like("0"));
        assert!(!parse_bool_like("garbage"));
    }

    #[test]
    fn unknown_language_is_rejected() {
        assert!(emitter_for("python").is_none());
        assert!(emitter_for("c").is_some());
        assert!(emitter_for("js").is_some());
    }

}
