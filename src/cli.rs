//! Command-line interface definitions and handlers.
//!
//! The `run` subcommand drives the two-step flow interactively; `generate` and
//! `animate` run a single step non-interactively.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};

use crate::config::{Config, ConfigError};
use crate::credential::{CredentialError, CredentialGate, KeyStatus, KeyStore, TerminalKeySelector};
use crate::flow::{FlowController, FlowError, Step, KEY_NOT_FOUND_MESSAGE, LOGO_LOADING_MESSAGE};
use crate::genai::{
    validate_prompt, AnimationRequest, AspectRatio, GeminiClient, GenaiError, LogoImage,
};

/// Help text shown when no API key is configured.
const MISSING_KEY_HELP: &str = "GEMINI_API_KEY environment variable is not set.\n\n\
    Add your API key to a .env file:\n\
    \x20   echo 'GEMINI_API_KEY=your-api-key-here' >> .env\n\n\
    Or set it as an environment variable:\n\
    \x20   export GEMINI_API_KEY=\"your-api-key-here\"\n\n\
    Get your API key at: https://aistudio.google.com/apikey";

fn parse_aspect_ratio(s: &str) -> Result<AspectRatio, String> {
    s.parse()
}

/// logo-animator: design a logo, then animate it
#[derive(Parser, Debug)]
#[command(name = "logo-animator")]
#[command(version, about = "Generate a logo from a prompt and animate it into a short video")]
#[command(after_help = "EXAMPLES:
    # Interactive two-step flow
    logo-animator

    # Generate a logo only
    logo-animator generate \"A minimalist leaf logo for EcoBloom\"

    # Animate an existing image in portrait
    logo-animator animate --image logo.png --aspect-ratio 9:16")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Config file (default: <config dir>/logo-animator/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Interactively generate a logo and animate it
    Run {
        /// Directory for logos and videos
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a logo image from a description
    Generate {
        /// Description of the logo
        prompt: String,
        /// Directory for the image
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Animate an existing image
    Animate {
        /// Image to animate
        #[arg(long)]
        image: PathBuf,
        /// Description of the animation
        #[arg(long)]
        prompt: Option<String>,
        /// 16:9 (landscape) or 9:16 (portrait)
        #[arg(long, default_value = "16:9", value_parser = parse_aspect_ratio)]
        aspect_ratio: AspectRatio,
        /// Directory for the video
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Errors surfaced by CLI handlers.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Genai(#[from] GenaiError),

    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Message(String),
}

/// Load the config file given with `--config`, or the default one.
///
/// An explicit path must exist and parse. A broken default file only warns.
pub fn load_config(path: Option<&Path>) -> Result<Config, CliError> {
    match path {
        Some(path) => Ok(Config::load_from_explicit(path)?),
        None => match Config::load() {
            Ok(config) => Ok(config),
            Err(e) => {
                eprintln!("Warning: Failed to load config file: {}", e);
                eprintln!("Using default settings.\n");
                Ok(Config::default())
            }
        },
    }
}

/// Build a client from config. The key is read from `keys` per request.
pub fn build_client(config: &Config, keys: KeyStore) -> Result<GeminiClient, GenaiError> {
    Ok(GeminiClient::with_base_url(keys, config.api.base_url.clone())?
        .with_image_model(config.api.image_model.clone())
        .with_video_model(config.api.video_model.clone())
        .with_resolution(config.video.resolution.clone())
        .with_poll_policy(config.video.poll_policy()))
}

/// Dispatch parsed arguments.
pub fn run(args: Args) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref())?;
    let command = args.command.unwrap_or(Command::Run { out: None });

    let rt = tokio::runtime::Runtime::new()?;
    match command {
        Command::Run { out } => {
            let out_dir = out.unwrap_or_else(|| config.output.dir_or_current());
            let keys = KeyStore::from_env();
            let gate = CredentialGate::new(
                Box::new(TerminalKeySelector::new(keys.clone())),
                keys.clone(),
            );
            let mut controller = FlowController::new(build_client(&config, keys)?, gate);

            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut output = std::io::stdout();
            rt.block_on(run_session(&mut controller, &mut input, &mut output, &out_dir))
        }
        Command::Generate { prompt, out } => {
            let out_dir = out.unwrap_or_else(|| config.output.dir_or_current());
            rt.block_on(run_generate(&config, &prompt, &out_dir))
        }
        Command::Animate {
            image,
            prompt,
            aspect_ratio,
            out,
        } => {
            let out_dir = out.unwrap_or_else(|| config.output.dir_or_current());
            rt.block_on(run_animate(&config, &image, prompt, aspect_ratio, &out_dir))
        }
    }
}

fn require_env_key() -> Result<KeyStore, CliError> {
    let keys = KeyStore::from_env();
    if keys.is_set() {
        Ok(keys)
    } else {
        Err(CliError::Message(MISSING_KEY_HELP.to_string()))
    }
}

async fn run_generate(config: &Config, prompt: &str, out_dir: &Path) -> Result<(), CliError> {
    let client = build_client(config, require_env_key()?)?;

    eprintln!("{}", LOGO_LOADING_MESSAGE);
    let image = client.generate_image(prompt).await?;
    let path = image.save_to(out_dir)?;

    println!("Logo ready!");
    println!("  Path: {}", path.display());
    Ok(())
}

async fn run_animate(
    config: &Config,
    image_path: &Path,
    prompt: Option<String>,
    aspect_ratio: AspectRatio,
    out_dir: &Path,
) -> Result<(), CliError> {
    let image = LogoImage::from_path(image_path)?;
    let client = build_client(config, require_env_key()?)?;

    let request = AnimationRequest::new(image, prompt, aspect_ratio);
    let result = client
        .animate(request, |message| eprintln!("{}", message))
        .await;

    let video = match result {
        Ok(video) => video,
        Err(err) if err.is_credential_not_found() => {
            return Err(CliError::Message(KEY_NOT_FOUND_MESSAGE.to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    let path = video.save_to(out_dir)?;
    println!("Your animated logo is ready!");
    println!("  Path: {}", path.display());
    Ok(())
}

/// Read one trimmed line. `None` at end of input.
fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>, CliError> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn ask<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> Result<Option<String>, CliError> {
    write!(output, "{} ", question)?;
    output.flush()?;
    read_line(input)
}

/// Make sure the gate has a key before a generation call.
///
/// A gate that was reset after a rejected key asks for a new one instead of
/// re-checking. The key prompt uses the session's own streams.
fn ensure_key<R: BufRead, W: Write>(
    controller: &mut FlowController,
    input: &mut R,
    output: &mut W,
) -> Result<(), CredentialError> {
    let gate = controller.gate_mut();
    if gate.status() == KeyStatus::Checking && gate.check_credential() {
        return Ok(());
    }
    if !gate.is_present() {
        gate.request_credential(input, output)?;
    }
    Ok(())
}

/// Interactive two-step session over `input`/`output`.
///
/// Images and videos are written to `out_dir`. Ends when the user quits, the
/// input is exhausted, or declines to create another logo.
pub async fn run_session<R: BufRead, W: Write>(
    controller: &mut FlowController,
    input: &mut R,
    output: &mut W,
    out_dir: &Path,
) -> Result<(), CliError> {
    writeln!(output, "Logo Animator - from concept to animation in two steps")?;

    loop {
        if let Some(error) = controller.state().error() {
            writeln!(output, "Error: {}", error)?;
        }

        match controller.state().step() {
            Step::GeneratingLogo => {
                if controller.state().logo().is_some() {
                    let Some(answer) = ask(
                        input,
                        output,
                        "Animate this logo? [y]es / [r]egenerate / [q]uit:",
                    )?
                    else {
                        return Ok(());
                    };
                    match answer.to_lowercase().as_str() {
                        "y" | "yes" => {
                            controller.confirm_logo()?;
                            continue;
                        }
                        "q" | "quit" => return Ok(()),
                        _ => {}
                    }
                }

                writeln!(output, "Step 1: Design your logo")?;
                let Some(prompt) = ask(input, output, "Describe your logo ('q' to quit):")? else {
                    return Ok(());
                };
                if prompt.eq_ignore_ascii_case("q") {
                    return Ok(());
                }

                if validate_prompt(&prompt).is_ok() {
                    if let Err(err) = ensure_key(controller, input, output) {
                        writeln!(output, "Error: {}", err)?;
                        continue;
                    }
                    writeln!(output, "{}", LOGO_LOADING_MESSAGE)?;
                }
                if controller.generate_logo(&prompt).await.is_ok() {
                    if let Some(logo) = controller.state().logo() {
                        let path = logo.save_to(out_dir)?;
                        writeln!(output, "Logo preview saved to {}", path.display())?;
                    }
                }
            }
            Step::AnimatingLogo => {
                writeln!(output, "Step 2: Animate your logo")?;
                let Some(upload) = ask(
                    input,
                    output,
                    "Use a different image? Enter a path, or press Enter to keep this logo ('b' to go back):",
                )?
                else {
                    return Ok(());
                };
                if upload.eq_ignore_ascii_case("b") {
                    controller.back()?;
                    continue;
                }
                if !upload.is_empty() {
                    match LogoImage::from_path(Path::new(&upload)) {
                        Ok(image) => controller.replace_logo(image)?,
                        Err(err) => {
                            writeln!(output, "Error: {}", err)?;
                            continue;
                        }
                    }
                }

                let Some(prompt) = ask(input, output, "Describe the animation (optional):")? else {
                    return Ok(());
                };
                let Some(ratio) = ask(input, output, "Aspect ratio [16:9 / 9:16] (default 16:9):")?
                else {
                    return Ok(());
                };
                let aspect_ratio = if ratio.is_empty() {
                    AspectRatio::default()
                } else {
                    match ratio.parse::<AspectRatio>() {
                        Ok(r) => r,
                        Err(e) => {
                            writeln!(output, "Error: {}", e)?;
                            continue;
                        }
                    }
                };

                if let Err(err) = ensure_key(controller, input, output) {
                    writeln!(output, "Error: {}", err)?;
                    continue;
                }
                let prompt = (!prompt.is_empty()).then_some(prompt);
                let _ = controller
                    .animate(prompt, aspect_ratio, |message| {
                        let _ = writeln!(output, "  {}", message);
                    })
                    .await;
            }
            Step::Result => {
                if let Some(video) = controller.state().video() {
                    let path = video.save_to(out_dir)?;
                    writeln!(output, "Your animated logo is ready!")?;
                    writeln!(output, "  Path: {}", path.display())?;
                }
                let answer = ask(input, output, "Create another? [y/N]:")?;
                match answer.as_deref().map(str::to_lowercase).as_deref() {
                    Some("y") | Some("yes") => controller.start_over(),
                    _ => return Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_none() {
        let args = Args::try_parse_from(["logo-animator"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_parse_generate() {
        let args = Args::try_parse_from(["logo-animator", "generate", "leaf logo", "-v"]).unwrap();
        assert_eq!(
            args.command,
            Some(Command::Generate {
                prompt: "leaf logo".to_string(),
                out: None
            })
        );
        assert_eq!(args.verbose, 1);
    }

    #[test]
    fn test_parse_animate_with_portrait() {
        let args = Args::try_parse_from([
            "logo-animator",
            "animate",
            "--image",
            "logo.png",
            "--aspect-ratio",
            "9:16",
        ])
        .unwrap();
        match args.command {
            Some(Command::Animate {
                image,
                aspect_ratio,
                prompt,
                ..
            }) => {
                assert_eq!(image, PathBuf::from("logo.png"));
                assert_eq!(aspect_ratio, AspectRatio::Portrait);
                assert!(prompt.is_none());
            }
            other => panic!("Expected Animate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_animate_rejects_unknown_ratio() {
        let result = Args::try_parse_from([
            "logo-animator",
            "animate",
            "--image",
            "logo.png",
            "--aspect-ratio",
            "4:3",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_client_applies_config() {
        let config = Config::parse(
            r#"
            [api]
            base_url = "http://localhost:8080"
            image_model = "imagen-test"
            [video]
            poll_interval_secs = 1
            max_poll_attempts = 3
            "#,
        )
        .unwrap();
        let client = build_client(&config, KeyStore::new()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.image_model(), "imagen-test");
        assert_eq!(client.poll_policy().max_attempts, Some(3));
    }

    #[test]
    fn test_read_line_eof() {
        let mut input = std::io::Cursor::new(Vec::new());
        assert_eq!(read_line(&mut input).unwrap(), None);

        let mut input = std::io::Cursor::new(b"  hello \n".to_vec());
        assert_eq!(read_line(&mut input).unwrap(), Some("hello".to_string()));
    }
}
