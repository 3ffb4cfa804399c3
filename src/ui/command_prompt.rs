use std::collections::BTreeMap;
use std::sync::Arc;

use bevy::input::keyboard::{Key, KeyboardInput};
use bevy::prelude::*;
use bevy::window::{CursorGrabMode, PrimaryWindow};

use crate::camera::CameraFocus;
use crate::celestial::time::SimulationContext;
use crate::mutation::{enqueue, MutationQueue, SceneCommand};
use crate::scene::persistence::SceneStoreHandle;
use crate::scene::{SceneDocument, SolarSystem};

#[derive(Component)]
pub struct CommandPrompt {
    pub visible: bool,
    pub input_buffer: String,
    pub history: Vec<String>,
    pub history_index: Option<usize>,
    pub output_lines: Vec<String>,
    pub max_output_lines: usize,
}

impl Default for CommandPrompt {
    fn default() -> Self {
        Self {
            visible: false,
            input_buffer: String::new(),
            history: Vec::new(),
            history_index: None,
            output_lines: Vec::new(),
            max_output_lines: 20,
        }
    }
}

impl CommandPrompt {
    fn push_output(&mut self, line: String) {
        self.output_lines.push(line);
        if self.output_lines.len() > self.max_output_lines {
            let excess = self.output_lines.len() - self.max_output_lines;
            self.output_lines.drain(..excess);
        }
    }
}

#[derive(Component)]
pub struct CommandPromptUI;

#[derive(Component)]
pub struct CommandInputText;

#[derive(Component)]
pub struct CommandOutputText;

#[derive(Resource, Default)]
pub struct CommandPromptState {
    pub is_open: bool,
}

type CommandFn = dyn Fn(&[&str], &mut World) -> Result<String, String> + Send + Sync;

pub struct CommandHandler {
    pub name: String,
    pub description: String,
    pub usage: String,
    pub execute: Box<CommandFn>,
}

#[derive(Resource, Clone)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Arc<CommandHandler>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        let mut registry = Self {
            commands: BTreeMap::new(),
        };
        registry.register_default_commands();
        registry
    }
}

/// Output of `/clear`; the prompt empties its log instead of printing it.
const CLEARED: &str = "Console cleared";

impl CommandRegistry {
    pub fn register_command(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        usage: impl Into<String>,
        execute: impl Fn(&[&str], &mut World) -> Result<String, String> + Send + Sync + 'static,
    ) {
        let name = name.into();
        self.commands.insert(
            name.clone(),
            Arc::new(CommandHandler {
                name,
                description: description.into(),
                usage: usage.into(),
                execute: Box::new(execute),
            }),
        );
    }

    fn register_default_commands(&mut self) {
        self.register_command(
            "help",
            "Show available commands",
            "/help [command]",
            |args, world| {
                let registry = world.resource::<CommandRegistry>();
                if let Some(name) = args.get(1) {
                    let command = registry
                        .commands
                        .get(*name)
                        .ok_or_else(|| format!("Unknown command: {name}"))?;
                    return Ok(format!(
                        "{}: {}\nUsage: {}",
                        command.name, command.description, command.usage
                    ));
                }
                let mut output = String::from("Available commands:");
                for (name, command) in &registry.commands {
                    output.push_str(&format!("\n  /{} - {}", name, command.description));
                }
                Ok(output)
            },
        );

        self.register_command("clear", "Clear the command output", "/clear", |_, _| {
            Ok(CLEARED.to_string())
        });

        self.register_command(
            "add_moon",
            "Add a moon to a planet orbiting the root",
            "/add_moon <planet>",
            |args, world| {
                if args.len() < 2 {
                    return Err("Usage: /add_moon <planet>".to_string());
                }
                let planet = args[1..].join(" ");
                let sender = world
                    .get_resource::<MutationQueue>()
                    .ok_or("Mutation queue not available")?
                    .sender();
                enqueue(
                    &sender,
                    SceneCommand::AddMoon {
                        planet: planet.clone(),
                    },
                )
                .map_err(|error| error.to_string())?;
                Ok(format!("Queued a new moon for {planet}"))
            },
        );

        self.register_command(
            "speed",
            "Show or set the simulation speed factor",
            "/speed [factor]",
            |args, world| {
                let mut context = world
                    .get_resource_mut::<SimulationContext>()
                    .ok_or("Simulation not available")?;
                if let Some(value) = args.get(1) {
                    let factor = value
                        .parse::<f32>()
                        .map_err(|_| format!("Invalid speed factor: {value}"))?;
                    context.set_speed_factor(factor);
                }
                Ok(format!("Simulation speed x{}", context.speed_factor))
            },
        );

        self.register_command(
            "freeze",
            "Toggle the simulation freeze",
            "/freeze",
            |_, world| {
                let mut context = world
                    .get_resource_mut::<SimulationContext>()
                    .ok_or("Simulation not available")?;
                let frozen = context.toggle_frozen();
                Ok(if frozen { "Simulation frozen" } else { "Simulation resumed" }.to_string())
            },
        );

        self.register_command(
            "reload",
            "Re-read the scene file and rebuild",
            "/reload",
            |_, world| {
                let root = world
                    .get_resource::<SceneStoreHandle>()
                    .ok_or("Scene store not available")?
                    .store()
                    .load()
                    .map_err(|error| error.to_string())?;
                let label = root.label().to_string();
                let mut document = world
                    .get_resource_mut::<SceneDocument>()
                    .ok_or("Scene not available")?;
                document.replace(Some(root));
                Ok(format!("Reloaded '{label}'"))
            },
        );

        self.register_command(
            "focus",
            "Orbit the camera around a body, or clear the focus",
            "/focus [body]",
            |args, world| {
                if args.len() < 2 {
                    world
                        .get_resource_mut::<CameraFocus>()
                        .ok_or("Camera not available")?
                        .clear();
                    return Ok("Free-fly camera".to_string());
                }
                let name = args[1..].join(" ");
                let system = world
                    .get_resource::<SolarSystem>()
                    .ok_or("Scene not available")?;
                let id = system
                    .find_by_name(&name)
                    .ok_or_else(|| format!("No body named {name}"))?;
                let mut focus = CameraFocus::default();
                focus.focus(system, id);
                *world
                    .get_resource_mut::<CameraFocus>()
                    .ok_or("Camera not available")? = focus;
                Ok(format!("Following {name}"))
            },
        );

        self.register_command(
            "list",
            "List the bodies of the current scene",
            "/list",
            |_, world| {
                let system = world
                    .get_resource::<SolarSystem>()
                    .ok_or("Scene not available")?;
                if system.is_empty() {
                    return Ok("The scene is empty".to_string());
                }
                let lines: Vec<String> = system
                    .iter()
                    .map(|entry| {
                        format!(
                            "{}{} ({})",
                            "  ".repeat(entry.depth as usize),
                            entry.body.name(),
                            entry.body.kind().as_str()
                        )
                    })
                    .collect();
                Ok(lines.join("\n"))
            },
        );
    }

    pub fn execute_command(&self, input: &str, world: &mut World) -> Result<String, String> {
        let input = input.trim();
        let Some(body) = input.strip_prefix('/') else {
            return Err("Commands must start with '/'".to_string());
        };

        let parts: Vec<&str> = body.split_whitespace().collect();
        let Some(command_name) = parts.first() else {
            return Err("Empty command".to_string());
        };

        match self.commands.get(*command_name) {
            Some(handler) => (handler.execute)(&parts, world),
            None => Err(format!("Unknown command: {command_name}")),
        }
    }
}

pub fn setup_command_prompt(mut commands: Commands) {
    commands
        .spawn((
            NodeBundle {
                style: Style {
                    position_type: PositionType::Absolute,
                    width: Val::Percent(60.0),
                    height: Val::Percent(40.0),
                    left: Val::Percent(20.0),
                    bottom: Val::Percent(30.0),
                    flex_direction: FlexDirection::Column,
                    padding: UiRect::all(Val::Px(10.0)),
                    ..default()
                },
                background_color: BackgroundColor(Color::srgba(0.05, 0.07, 0.12, 0.9)),
                visibility: Visibility::Hidden,
                ..default()
            },
            CommandPromptUI,
            CommandPrompt::default(),
        ))
        .with_children(|parent| {
            parent
                .spawn(NodeBundle {
                    style: Style {
                        flex_grow: 1.0,
                        flex_direction: FlexDirection::Column,
                        overflow: Overflow::clip(),
                        ..default()
                    },
                    ..default()
                })
                .with_children(|parent| {
                    parent.spawn((
                        TextBundle {
                            style: Style {
                                margin: UiRect::bottom(Val::Px(10.0)),
                                ..default()
                            },
                            text: Text::from_section(
                                "",
                                TextStyle {
                                    font_size: 14.0,
                                    color: Color::srgb(0.9, 0.9, 0.9),
                                    ..default()
                                },
                            ),
                            ..default()
                        },
                        CommandOutputText,
                    ));
                });

            parent
                .spawn(NodeBundle {
                    style: Style {
                        width: Val::Percent(100.0),
                        height: Val::Px(30.0),
                        border: UiRect::all(Val::Px(1.0)),
                        padding: UiRect::all(Val::Px(5.0)),
                        align_items: AlignItems::Center,
                        ..default()
                    },
                    background_color: BackgroundColor(Color::srgba(0.02, 0.02, 0.05, 1.0)),
                    border_color: BorderColor(Color::srgb(0.3, 0.35, 0.5)),
                    ..default()
                })
                .with_children(|parent| {
                    parent.spawn((
                        TextBundle {
                            text: Text::from_section(
                                "/_",
                                TextStyle {
                                    font_size: 16.0,
                                    color: Color::WHITE,
                                    ..default()
                                },
                            ),
                            ..default()
                        },
                        CommandInputText,
                    ));
                });
        });
}

pub fn open_command_prompt(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut query: Query<(&mut CommandPrompt, &mut Visibility), With<CommandPromptUI>>,
    mut state: ResMut<CommandPromptState>,
    mut window_query: Query<&mut Window, With<PrimaryWindow>>,
) {
    if state.is_open || !keyboard.just_pressed(KeyCode::Slash) {
        return;
    }

    // the slash itself is typed into the buffer by `handle_command_input` this frame
    for (mut prompt, mut visibility) in query.iter_mut() {
        prompt.visible = true;
        prompt.input_buffer.clear();
        prompt.history_index = None;
        *visibility = Visibility::Visible;
        state.is_open = true;
    }

    if let Ok(mut window) = window_query.get_single_mut() {
        window.cursor.grab_mode = CursorGrabMode::None;
        window.cursor.visible = true;
    }
}

pub fn handle_command_input(
    mut events: EventReader<KeyboardInput>,
    time: Res<Time>,
    mut prompt_query: Query<(&mut CommandPrompt, &mut Visibility), With<CommandPromptUI>>,
    mut text_query: Query<&mut Text, With<CommandInputText>>,
    mut output_query: Query<&mut Text, (With<CommandOutputText>, Without<CommandInputText>)>,
    mut world_commands: Commands,
    mut state: ResMut<CommandPromptState>,
) {
    let Some((mut prompt, mut visibility)) =
        prompt_query.iter_mut().find(|(prompt, _)| prompt.visible)
    else {
        // keystrokes made while closed must not show up once it opens
        events.clear();
        return;
    };

    for event in events.read() {
        if !event.state.is_pressed() {
            continue;
        }

        match &event.logical_key {
            Key::Enter => {
                let input = std::mem::take(&mut prompt.input_buffer);
                if input.trim().is_empty() {
                    continue;
                }
                prompt.history.push(input.clone());
                prompt.history_index = None;

                world_commands.add(move |world: &mut World| {
                    let registry = world.resource::<CommandRegistry>().clone();
                    let result = registry.execute_command(&input, world);

                    let mut prompts = world.query::<&mut CommandPrompt>();
                    for mut prompt in prompts.iter_mut(world) {
                        match &result {
                            Ok(message) if message == CLEARED => prompt.output_lines.clear(),
                            Ok(message) => prompt.push_output(format!("> {input}\n{message}")),
                            Err(message) => {
                                prompt.push_output(format!("> {input}\nError: {message}"))
                            }
                        }
                    }
                });
            }
            Key::Backspace => {
                prompt.input_buffer.pop();
            }
            Key::Escape => {
                prompt.visible = false;
                *visibility = Visibility::Hidden;
                state.is_open = false;
                break;
            }
            Key::ArrowUp => {
                if prompt.history.is_empty() {
                    continue;
                }
                let index = match prompt.history_index {
                    Some(index) if index > 0 => index - 1,
                    Some(index) => index,
                    None => prompt.history.len() - 1,
                };
                prompt.history_index = Some(index);
                prompt.input_buffer = prompt.history[index].clone();
            }
            Key::ArrowDown => {
                if let Some(index) = prompt.history_index {
                    if index + 1 < prompt.history.len() {
                        prompt.history_index = Some(index + 1);
                        prompt.input_buffer = prompt.history[index + 1].clone();
                    } else {
                        prompt.history_index = None;
                        prompt.input_buffer.clear();
                    }
                }
            }
            Key::Space => prompt.input_buffer.push(' '),
            Key::Character(characters) => {
                prompt
                    .input_buffer
                    .extend(characters.chars().filter(|c| !c.is_control()));
            }
            _ => {}
        }
    }

    let cursor = if (time.elapsed_seconds() * 2.0) as i32 % 2 == 0 { "_" } else { "" };
    let display_text = format!("{}{}", prompt.input_buffer, cursor);
    for mut text in text_query.iter_mut() {
        text.sections[0].value.clone_from(&display_text);
    }
    for mut text in output_query.iter_mut() {
        text.sections[0].value = prompt.output_lines.join("\n");
    }
}

pub struct CommandPromptPlugin;

impl Plugin for CommandPromptPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CommandRegistry>()
            .init_resource::<CommandPromptState>()
            .add_systems(Startup, setup_command_prompt)
            .add_systems(
                Update,
                (open_command_prompt, handle_command_input)
                    .chain()
                    .in_set(crate::SandboxSet::Input),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneNode;

    fn world() -> World {
        let root: SceneNode = serde_json::from_str(
            r#"{ "name": "Sun", "type": "star", "radius": 5, "orbit_radius": 0,
                 "orbit_speed": 0, "rotation_speed": 0,
                 "children": [ { "name": "Mars", "type": "planet", "radius": 0.5,
                   "orbit_radius": 15, "orbit_speed": 24, "rotation_speed": 40 } ] }"#,
        )
        .unwrap();
        let (system, _) = SolarSystem::build(&root);

        let mut world = World::new();
        world.init_resource::<CommandRegistry>();
        world.init_resource::<SimulationContext>();
        world.init_resource::<MutationQueue>();
        world.init_resource::<CameraFocus>();
        world.insert_resource(system);
        world.insert_resource(SceneDocument::new(Some(root)));
        world
    }

    fn run(world: &mut World, input: &str) -> Result<String, String> {
        let registry = world.resource::<CommandRegistry>().clone();
        registry.execute_command(input, world)
    }

    #[test]
    fn rejects_input_without_slash_and_unknown_commands() {
        let mut world = world();
        assert!(run(&mut world, "speed 2").is_err());
        assert_eq!(run(&mut world, "/warp 9"), Err("Unknown command: warp".to_string()));
        assert_eq!(run(&mut world, "/"), Err("Empty command".to_string()));
    }

    #[test]
    fn speed_and_freeze_update_the_context() {
        let mut world = world();
        assert_eq!(run(&mut world, "/speed 4"), Ok("Simulation speed x4".to_string()));
        assert!(run(&mut world, "/speed fast").is_err());
        run(&mut world, "/freeze").unwrap();
        let context = world.resource::<SimulationContext>();
        assert_eq!(context.speed_factor, 4.0);
        assert!(context.frozen);
    }

    #[test]
    fn add_moon_goes_through_the_queue() {
        let mut world = world();
        run(&mut world, "/add_moon Mars").unwrap();
        assert!(run(&mut world, "/add_moon").is_err());
        let queued = world.resource::<MutationQueue>().drain();
        assert_eq!(
            queued,
            [SceneCommand::AddMoon {
                planet: "Mars".to_string()
            }]
        );
    }

    #[test]
    fn focus_and_list_use_the_live_scene() {
        let mut world = world();
        assert_eq!(run(&mut world, "/focus Mars"), Ok("Following Mars".to_string()));
        assert_eq!(
            world.resource::<CameraFocus>().target.as_ref().map(|t| t.name.as_str()),
            Some("Mars")
        );
        assert!(run(&mut world, "/focus Pluto").is_err());
        run(&mut world, "/focus").unwrap();
        assert!(world.resource::<CameraFocus>().target.is_none());

        assert_eq!(run(&mut world, "/list"), Ok("Sun (star)\n  Mars (planet)".to_string()));
    }

    #[test]
    fn help_lists_registered_commands() {
        let mut world = world();
        let help = run(&mut world, "/help").unwrap();
        assert!(help.contains("/add_moon"));
        assert!(help.contains("/reload"));
        assert!(run(&mut world, "/help speed").unwrap().contains("Usage: /speed [factor]"));
    }

    #[test]
    fn output_is_capped() {
        let mut prompt = CommandPrompt {
            max_output_lines: 2,
            ..Default::default()
        };
        for line in ["a", "b", "c"] {
            prompt.push_output(line.to_string());
        }
        assert_eq!(prompt.output_lines, ["b", "c"]);
    }
}
