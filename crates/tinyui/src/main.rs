//! TinyUI demo: text layout inspection and headless rendering.

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use anyhow::{Context, Result};
    use clap::{Parser, Subcommand};
    use std::rc::Rc;
    use std::time::Duration;
    use tinyui::{
        Color, DefaultFetcher, Engine, EngineOptions, FrameStats, HeadlessGl, NodeId, Rect, TextStyle, TextSystem,
    };
    use tracing::{debug, info, warn, Level};
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    /// TinyUI demo
    #[derive(Parser, Debug)]
    #[command(author, version, about, long_about = None)]
    pub struct Cli {
        /// Enable verbose logging
        #[arg(short, long, global = true)]
        verbose: bool,

        /// Use fixed-advance metrics instead of system fonts
        #[arg(long, global = true)]
        monospace: bool,

        #[command(subcommand)]
        command: Command,
    }

    #[derive(Subcommand, Debug, PartialEq)]
    enum Command {
        /// Lay out a string and print its lines
        Layout {
            text: String,

            /// Parse BBCode tags
            #[arg(long)]
            bbcode: bool,

            /// Wrap width in pixels
            #[arg(long)]
            max_width: Option<f32>,

            #[arg(long, default_value = "26")]
            font_size: f32,

            /// Print the full layout as JSON
            #[arg(long)]
            json: bool,
        },
        /// Render a demo scene into a headless context
        Render {
            #[arg(long, default_value = "60")]
            frames: u32,

            #[arg(long, default_value = "640")]
            width: u32,

            #[arg(long, default_value = "360")]
            height: u32,

            /// Render without clearing and restore GL state after each frame
            #[arg(long)]
            patch: bool,

            /// Image path or URL shown as a bitmap
            #[arg(long)]
            image: Option<String>,
        },
    }

    fn init_logging(verbose: bool) -> Result<()> {
        let level = if verbose { Level::DEBUG } else { Level::INFO };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
        let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(())
    }

    pub async fn run() -> Result<()> {
        let cli = Cli::parse();
        init_logging(cli.verbose)?;
        info!("TinyUI v{}", tinyui::VERSION);

        let text = if cli.monospace { TextSystem::monospace() } else { TextSystem::with_system_fonts() };
        match cli.command {
            Command::Layout { text: content, bbcode, max_width, font_size, json } => {
                let style = TextStyle {
                    bbcode_enabled: bbcode,
                    max_width,
                    word_wrap: max_width.is_some(),
                    font_size,
                    ..TextStyle::default()
                };
                let layout = text.layout(&content, &style);
                if json {
                    println!("{}", serde_json::to_string_pretty(&layout)?);
                } else {
                    for (i, line) in layout.lines.iter().enumerate() {
                        println!("{i:>3} {:>8.1}px  {}", line.width, line.text());
                        for unit in &line.units {
                            println!("      {:>8.1} +{:<6.1} {:?}", unit.x, unit.width, unit.text);
                        }
                    }
                    let (w, h) = layout.pixel_size();
                    println!("{} lines, {w}x{h} px", layout.lines.len());
                }
            }
            Command::Render { frames, width, height, patch, image } => {
                let stats = render_demo(Rc::new(text), frames, width, height, patch, image).await?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
        }
        Ok(())
    }

    async fn render_demo(
        text: Rc<TextSystem>,
        frames: u32,
        width: u32,
        height: u32,
        patch: bool,
        image: Option<String>,
    ) -> Result<FrameStats> {
        let gl = Rc::new(HeadlessGl::new(width as i32, height as i32));
        let options = EngineOptions::new()
            .with_saved_gl_state(patch)
            .with_clear_color(Color::from_rgb_u32(0x202830));
        let mut engine = Engine::with_text_system(gl.clone(), options, Rc::new(DefaultFetcher::new()), text)?;
        let spinner = build_scene(&mut engine, width as f32, height as f32)?;

        engine.add_tick(move |scene, dt| {
            if let Some(node) = scene.get_mut(spinner) {
                let rotation = node.rotation + (dt as f32) * 0.002;
                node.set_rotation(rotation);
            }
            Ok(())
        });

        if let Some(source) = image {
            let (bitmap, load) = engine.create_bitmap_from_url(&source)?;
            let root = engine.root();
            engine.scene_mut().add_child(root, bitmap)?;
            let mut load = load;
            // uploads only run inside a render
            let result = loop {
                tokio::select! {
                    result = &mut load => break result,
                    _ = tokio::time::sleep(Duration::from_millis(16)) => {
                        engine.render()?;
                    }
                }
            };
            match result {
                Ok(id) => info!(size = ?engine.scene().size(id), "image loaded"),
                Err(e) => warn!(error = %e, "image failed to load"),
            }
        }

        let mut last = FrameStats::default();
        for frame in 0..frames {
            last = engine.frame(frame as f64 * 16.0).context("frame failed")?;
            debug!(frame, draw_calls = last.draw_calls, "frame");
        }
        let gl_stats = gl.stats();
        info!(
            textures = gl_stats.textures_created,
            uploads = gl_stats.texture_uploads,
            clears = gl_stats.clears,
            "rendered {frames} frames"
        );
        engine.destroy();
        Ok(last)
    }

    /// Background, a clipped spinning panel and a BBCode label. Returns the
    /// spinning node.
    fn build_scene(engine: &mut Engine<HeadlessGl>, width: f32, height: f32) -> Result<NodeId> {
        let root = engine.root();

        let background = engine.create_graphics("background");
        if let Some(g) = engine.scene_mut().graphics_mut(background) {
            g.fill_rect(0.0, 0.0, width, height, Color::from_rgb_u32(0x303a48));
        }
        engine.scene_mut().add_child(root, background)?;

        let panel = engine.create_container("panel");
        engine
            .scene_mut()
            .node_mut(panel)?
            .set_position(width / 2.0, height / 2.0)
            .set_clip_rect(Some(Rect::new(-100.0, -100.0, 200.0, 200.0)));
        engine.scene_mut().add_child(root, panel)?;

        let spinner = engine.create_graphics("spinner");
        if let Some(g) = engine.scene_mut().graphics_mut(spinner) {
            g.fill_rect(-80.0, -20.0, 160.0, 40.0, Color::from_rgb_u32(0xe0a030))
                .fill_circle(0.0, 0.0, 30.0, Color::WHITE);
        }
        engine.scene_mut().node_mut(spinner)?.set_alpha(0.8);
        engine.scene_mut().add_child(panel, spinner)?;

        let label = engine.create_text("[b]Tiny[/b][color=#e0a030]UI[/color] [i]demo[/i]", "label");
        engine.scene_mut().node_mut(label)?.set_position(16.0, 16.0);
        engine.scene_mut().add_child(root, label)?;

        Ok(spinner)
    }

}

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    cli::run().await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
