mod fit;
mod predict;
mod transform;

/// Subcommands for tvae
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Fit a model and save its state.
    Fit(fit::FitArgs),

    /// Write the latent vector of each input text.
    Transform(transform::TransformArgs),

    /// Regenerate each input text through the model.
    Predict(predict::PredictArgs),
}

impl Commands {
    /// Run the subcommand.
    pub fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        match self {
            Commands::Fit(cmd) => cmd.run(),
            Commands::Transform(cmd) => cmd.run(),
            Commands::Predict(cmd) => cmd.run(),
        }
    }
}
