use std::io::Write;

use crate::{
    embedding_args::EmbeddingArgs,
    input_output::{InputArgs, OutputArgs},
    logging::{CommandVerbosity, LogArgs},
};

/// Args for the transform command.
#[derive(clap::Args, Debug)]
pub struct TransformArgs {
    /// Saved model state.
    #[arg(long)]
    state: String,

    #[command(flatten)]
    embeddings: EmbeddingArgs,

    #[command(flatten)]
    input: InputArgs,

    #[command(flatten)]
    output: OutputArgs,

    #[clap(flatten)]
    pub logging: LogArgs,
}

impl TransformArgs {
    /// Encode every input line; one space-separated latent vector per line.
    pub fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.logging.setup_logging(CommandVerbosity::Inference)?;

        let vae = self.embeddings.load_estimator(&self.state)?;
        let texts = self.input.read_texts()?;
        log::info!("Encoding {} texts", texts.len());

        let latents = vae.transform(&texts)?;

        let mut writer = self.output.open_writer()?;
        for z in latents {
            let line = z.iter().map(|x| x.to_string()).collect::<Vec<_>>();
            writeln!(writer, "{}", line.join(" "))?;
        }
        writer.flush()?;

        Ok(())
    }
}
