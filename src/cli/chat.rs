use std::io::{self, IsTerminal, Read, Write};

use tokio::signal;
use tokio_util::sync::CancellationToken;
use xinfer::config::Config;
use xinfer::{
    CallArgs, ChatMessage, ChunkStream, ErrorKind, InferenceClient, NormalizedResult, TaskKind,
};

use crate::utils::errors::INTERRUPTED_EXIT_CODE;
use crate::{die, warn, GenerationArgs};

pub(crate) async fn chat_cmd(config: &Config, args: &GenerationArgs) {
    generation(config, args, TaskKind::Conversational).await;
}

pub(crate) async fn generate_cmd(config: &Config, args: &GenerationArgs) {
    generation(config, args, TaskKind::TextGeneration).await;
}

fn read_prompt(args: &GenerationArgs) -> String {
    let in_terminal = io::stdin().is_terminal();

    if let Some(prompt) = &args.prompt {
        if !in_terminal {
            die!("it appears that a prompt is being provided both through standard input and the prompt argument");
        }

        return prompt.clone();
    }

    if in_terminal {
        die!("no prompt was given, pass one as an argument or through standard input");
    }

    let mut buf = String::new();

    if let Err(err) = io::stdin().read_to_string(&mut buf) {
        die!("failed to read the prompt from standard input: {}", err);
    }

    buf
}

fn call_args(args: &GenerationArgs, task: TaskKind, prompt: String) -> CallArgs {
    let mut call = match task {
        TaskKind::Conversational => CallArgs::chat(&args.model, vec![ChatMessage::user(prompt)]),
        _ => CallArgs::text_generation(&args.model, prompt),
    };

    if let Some(provider) = args.provider {
        call = call.provider(provider);
    }

    if let Some(max_tokens) = args.max_tokens {
        let key = match task {
            TaskKind::Conversational => "max_tokens",
            _ => "max_new_tokens",
        };

        call = call.parameter(key, max_tokens);
    }

    call
}

/// Cancels `cancel` on the first Ctrl-C.
fn cancel_on_interrupt(cancel: &CancellationToken) {
    let cancel = cancel.clone();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}

fn fail(model: &str, err: xinfer::Error) -> ! {
    if err.kind() == ErrorKind::Cancelled {
        warn!("generation was cancelled");
        std::process::exit(INTERRUPTED_EXIT_CODE);
    }

    die!("generation with {} failed: {}", model, err);
}

fn flush_or_die() {
    if let Err(err) = io::stdout().flush() {
        die!("failed to flush the output stream: {}", err);
    }
}

async fn generation(config: &Config, args: &GenerationArgs, task: TaskKind) {
    let prompt = read_prompt(args);

    let client = match InferenceClient::from_config(config) {
        Ok(client) => client,
        Err(err) => die!("{}", err),
    };

    let call = call_args(args, task, prompt);

    let cancel = CancellationToken::new();
    cancel_on_interrupt(&cancel);

    if args.no_stream {
        match client.call(&call, &cancel).await {
            Ok(result) => print_result(&args.model, result),
            Err(err) => fail(&args.model, err),
        }
    } else {
        match client.stream(&call, cancel).await {
            Ok(chunks) => print_stream(&args.model, chunks).await,
            Err(err) => fail(&args.model, err),
        }
    }
}

async fn print_stream(model: &str, mut chunks: ChunkStream) {
    let mut ends_with_newline = true;

    while let Some(chunk) = chunks.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                if !ends_with_newline {
                    println!();
                }

                fail(model, err);
            }
        };

        if let Some(text) = chunk.delta_text() {
            if text.is_empty() {
                continue;
            }

            print!("{}", text);
            flush_or_die();

            ends_with_newline = text.ends_with('\n');
        }
    }

    if !ends_with_newline {
        println!();
    }
}

fn print_result(model: &str, result: NormalizedResult) {
    let text = match result {
        NormalizedResult::ChatCompletion(completion) => {
            completion.content().unwrap_or_default().to_string()
        }
        NormalizedResult::TextGeneration(generation) => generation.generated_text,
        other => die!("{} answered with an unexpected result: {:?}", model, other),
    };

    if text.ends_with('\n') {
        print!("{}", text);
    } else {
        println!("{}", text);
    }
}
