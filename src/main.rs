//! x11kit-demo - open a window and log what the dispatch core delivers
//!
//! ```text
//! x11kit-demo                      → window on $DISPLAY
//! x11kit-demo --display :1 --scale 2
//! RUST_LOG=x11kit=trace x11kit-demo
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use x11kit::{
    Application, ApplicationDelegate, Control, ControlEvent, Dispatch, DisplayConfig, Event,
    EventContext, Rect, Responder, ViewController, ViewId, ViewTree,
};

#[derive(Parser)]
#[command(name = "x11kit-demo")]
#[command(about = "Open a window and log dispatched X11 input events")]
#[command(version)]
struct Cli {
    /// X display to connect to (defaults to $DISPLAY, then :0)
    #[arg(short, long)]
    display: Option<String>,

    /// Logical to physical pixel scale (overrides X11KIT_FORCE_SCALE_FACTOR)
    #[arg(short, long)]
    scale: Option<f64>,

    /// Window title
    #[arg(short, long, default_value = "x11kit")]
    title: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("x11kit=info".parse()?)
                .add_directive("x11kit_demo=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = DisplayConfig::from_env().with_application_name("x11kit-demo");
    if let Some(display) = cli.display {
        config = config.with_display(display);
    }
    if let Some(scale) = cli.scale {
        config = config.with_scale_override(scale);
    }

    let mut app = Application::connect(&config)
        .with_context(|| format!("failed to connect to X display {}", config.display_name()))?;
    app.set_delegate(Box::new(Demo { title: cli.title }));
    app.run().context("event loop failed")?;
    Ok(())
}

struct Demo {
    title: String,
}

impl ApplicationDelegate for Demo {
    fn did_finish_launching(&mut self, app: &mut Application) {
        let number = match app.create_window(Rect::new(100.0, 100.0, 480.0, 320.0), &self.title) {
            Ok(number) => number,
            Err(err) => {
                warn!(%err, "could not create window");
                app.terminate();
                return;
            }
        };
        app.set_accepts_mouse_moved_events(number, true);
        if let Some(window) = app.window_mut(number) {
            window.set_root_view_controller(Some(Box::new(DemoController)));
        }
        info!(window = number.0, "demo window open, close it to quit");
    }

    fn should_terminate_after_last_window_closed(&mut self, _app: &mut Application) -> bool {
        true
    }

    fn will_terminate(&mut self, _app: &mut Application) {
        info!("bye");
    }
}

/// Root content: a button-like control and a key logger that takes focus
/// when clicked.
struct DemoController;

impl Responder for DemoController {
    fn mouse_moved(&mut self, cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        let location = cx.location_in_view(event);
        debug!(x = location.x, y = location.y, "mouse moved");
        Dispatch::Handled
    }

    fn scroll_wheel(&mut self, _cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        info!(
            dx = event.scrolling_delta_x(),
            dy = event.scrolling_delta_y(),
            "scroll"
        );
        Dispatch::Handled
    }
}

impl ViewController for DemoController {
    fn view_did_load(&mut self, tree: &mut ViewTree, view: ViewId) {
        let mut button = Control::new();
        button.add_action(ControlEvent::MOUSE_UP_INSIDE, |event, _| {
            info!(button = event.button_number(), "button clicked");
        });
        button.add_action(
            ControlEvent::MOUSE_DRAG_ENTER | ControlEvent::MOUSE_DRAG_EXIT,
            |_, fired| info!(?fired, "button drag"),
        );
        button.add_action(ControlEvent::RIGHT_MOUSE_UP_INSIDE, |_, _| {
            info!("button right-clicked");
        });
        let button_view = tree.add_view(Rect::new(20.0, 20.0, 120.0, 40.0), Box::new(button));
        tree.add_subview(view, button_view);

        let field = tree.add_view(Rect::new(20.0, 80.0, 240.0, 40.0), Box::new(KeyLogger));
        tree.add_subview(view, field);
    }

    fn view_did_appear(&mut self, _animated: bool) {
        info!("content visible");
    }
}

struct KeyLogger;

impl Responder for KeyLogger {
    fn mouse_down(&mut self, cx: &mut EventContext<'_>, _event: &Event) -> Dispatch {
        cx.become_first_responder();
        Dispatch::Handled
    }

    fn key_down(&mut self, _cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        info!(
            key_code = event.key_code(),
            characters = event.characters().unwrap_or(""),
            repeat = event.is_repeat(),
            "key down"
        );
        Dispatch::Handled
    }

    fn flags_changed(&mut self, _cx: &mut EventContext<'_>, event: &Event) -> Dispatch {
        info!(flags = ?event.modifier_flags(), "modifiers");
        Dispatch::Handled
    }

    fn accepts_first_responder(&self) -> bool {
        true
    }

    fn did_become_first_responder(&mut self) {
        info!("key logger focused");
    }
}
