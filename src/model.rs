//! This module defines the core `Model` trait, which is central to the
//! Model-View-Update (MVU) architecture used in `oolong` applications.
//! The `Model` trait provides a clear and consistent interface for managing
//! application state, processing messages, and rendering the user interface.

use crate::{Cmd, Message};

/// The Model trait defines the core interface for oolong applications.
///
/// Models represent your application's state and logic, following the
/// Model-View-Update pattern: state is a value, `update` is the only place
/// it changes, and `view` is a pure projection of it. The event loop owns
/// the model exclusively, so `update` mutates in place rather than
/// returning a fresh instance.
///
/// # Trait Bounds
///
/// - `Send`: the model is moved into the event loop task
/// - `Sized`: the model has a known size at compile time
/// - `'static`: the model holds no borrowed references
///
/// # Example
///
/// ```rust
/// use oolong::{Model, Message, Cmd, KeyMsg};
/// use crossterm::event::KeyCode;
///
/// struct Counter {
///     value: i32,
/// }
///
/// impl Model for Counter {
///     fn init() -> (Self, Option<Cmd>) {
///         (Self { value: 0 }, None)
///     }
///
///     fn update(&mut self, msg: Message) -> Option<Cmd> {
///         if let Message::Key(KeyMsg { key, .. }) = msg {
///             match key {
///                 KeyCode::Up => self.value += 1,
///                 KeyCode::Down => self.value -= 1,
///                 _ => {}
///             }
///         }
///         None
///     }
///
///     fn view(&self) -> String {
///         format!("Counter: {} (↑/↓ to change)", self.value)
///     }
/// }
/// ```
pub trait Model: Send + Sized + 'static {
    /// Initialize the model with its initial state and optional command.
    fn init() -> (Self, Option<Cmd>);

    /// Update the model in response to a message.
    fn update(&mut self, msg: Message) -> Option<Cmd>;

    /// Render the model as a string for display in the terminal.
    fn view(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{command, KeyMsg};
    use crossterm::event::{KeyCode, KeyModifiers};

    #[derive(Debug, Clone)]
    struct CounterModel {
        count: i32,
        step: i32,
    }

    impl Model for CounterModel {
        fn init() -> (Self, Option<Cmd>) {
            (Self { count: 0, step: 1 }, None)
        }

        fn update(&mut self, msg: Message) -> Option<Cmd> {
            if let Message::Key(key_msg) = msg {
                match key_msg.key {
                    KeyCode::Up | KeyCode::Char('+') => {
                        self.count += self.step;
                    }
                    KeyCode::Down | KeyCode::Char('-') => {
                        self.count -= self.step;
                    }
                    KeyCode::Char('r') => {
                        self.count = 0;
                    }
                    KeyCode::Char('s') => {
                        self.step = if self.step == 1 { 10 } else { 1 };
                    }
                    KeyCode::Char('q') => {
                        return Some(command::quit());
                    }
                    _ => {}
                }
            }
            None
        }

        fn view(&self) -> String {
            format!(
                "Counter: {}\nStep: {}\n\nControls:\n↑/+ : Increment\n↓/- : Decrement\nr : Reset\ns : Toggle step (1/10)\nq : Quit",
                self.count, self.step
            )
        }
    }

    fn key(code: KeyCode) -> Message {
        Message::Key(KeyMsg {
            key: code,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn test_counter_model_init() {
        let (model, cmd) = CounterModel::init();
        assert_eq!(model.count, 0);
        assert_eq!(model.step, 1);
        assert!(cmd.is_none());
    }

    #[test]
    fn test_counter_model_update() {
        let (mut model, _) = CounterModel::init();

        let cmd = model.update(key(KeyCode::Up));
        assert_eq!(model.count, 1);
        assert!(cmd.is_none());

        model.update(key(KeyCode::Down));
        assert_eq!(model.count, 0);

        model.count = 42;
        model.update(key(KeyCode::Char('r')));
        assert_eq!(model.count, 0);
    }

    #[test]
    fn test_counter_model_step_toggle() {
        let (mut model, _) = CounterModel::init();

        model.update(key(KeyCode::Char('s')));
        model.update(key(KeyCode::Up));
        assert_eq!(model.count, 10);

        model.update(key(KeyCode::Char('s')));
        model.update(key(KeyCode::Down));
        assert_eq!(model.count, 9);
    }

    #[tokio::test]
    async fn test_counter_model_quit_command() {
        let (mut model, _) = CounterModel::init();
        let cmd = model.update(key(KeyCode::Char('q'))).expect("quit command");
        let msg = cmd.await.expect("quit message");
        assert!(msg.is_quit());
    }

    #[test]
    fn test_counter_model_view() {
        let (model, _) = CounterModel::init();
        let view = model.view();
        assert!(view.contains("Counter: 0"));
        assert!(view.contains("Step: 1"));
        assert!(view.contains("Controls:"));
    }

    #[test]
    fn test_model_trait_bounds() {
        fn assert_send<T: Send>() {}
        fn assert_sized<T: Sized>() {}
        fn assert_static<T: 'static>() {}

        assert_send::<CounterModel>();
        assert_sized::<CounterModel>();
        assert_static::<CounterModel>();
    }
}
