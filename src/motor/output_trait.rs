//! Trait abstraction for motor outputs to enable testing

use async_trait::async_trait;
use tracing::info;

use crate::control::mixer::DriveCommand;
use crate::error::Result;

/// Actuator accepting signed drive commands for the two motors.
///
/// Values arrive already clamped to the mixer's full scale.
#[async_trait]
pub trait MotorOutput: Send {
    /// Applies `command` to the motors.
    async fn set_motors(&mut self, command: DriveCommand) -> Result<()>;
}

/// Output that only logs commands, for running without a motor controller.
#[derive(Debug, Default)]
pub struct DryRunMotors {
    last: Option<DriveCommand>,
}

impl DryRunMotors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent command received.
    pub fn last_command(&self) -> Option<DriveCommand> {
        self.last
    }
}

#[async_trait]
impl MotorOutput for DryRunMotors {
    async fn set_motors(&mut self, command: DriveCommand) -> Result<()> {
        if self.last != Some(command) {
            info!("Dry run: set_motors({}, {})", command.left, command.right);
            self.last = Some(command);
        }
        Ok(())
    }
}

#[async_trait]
impl<M: MotorOutput + ?Sized> MotorOutput for Box<M> {
    async fn set_motors(&mut self, command: DriveCommand) -> Result<()> {
        (**self).set_motors(command).await
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::RcBridgeError;
    use std::sync::{Arc, Mutex};

    /// Mock motor output recording every command
    #[derive(Clone, Default)]
    pub struct MockMotors {
        pub commands: Arc<Mutex<Vec<DriveCommand>>>,
        pub write_error: Arc<Mutex<Option<String>>>,
    }

    impl MockMotors {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get_commands(&self) -> Vec<DriveCommand> {
            self.commands.lock().unwrap().clone()
        }

        pub fn last_command(&self) -> Option<DriveCommand> {
            self.commands.lock().unwrap().last().copied()
        }

        pub fn set_write_error(&self, message: &str) {
            *self.write_error.lock().unwrap() = Some(message.to_string());
        }
    }

    #[async_trait]
    impl MotorOutput for MockMotors {
        async fn set_motors(&mut self, command: DriveCommand) -> Result<()> {
            self.commands.lock().unwrap().push(command);
            if let Some(message) = self.write_error.lock().unwrap().clone() {
                return Err(RcBridgeError::Serial(message));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::MockMotors;
    use super::*;

    #[test]
    fn test_dry_run_remembers_last_command() {
        let mut motors = DryRunMotors::new();
        assert_eq!(motors.last_command(), None);

        tokio_test::block_on(async {
            tokio_test::assert_ok!(motors.set_motors(DriveCommand::new(10, -10)).await);
            tokio_test::assert_ok!(motors.set_motors(DriveCommand::STOP).await);
        });
        assert_eq!(motors.last_command(), Some(DriveCommand::STOP));
    }

    #[tokio::test]
    async fn test_mock_records_commands_and_errors() {
        let mock = MockMotors::new();
        let mut motors = mock.clone();

        motors.set_motors(DriveCommand::new(1, 2)).await.unwrap();
        mock.set_write_error("unplugged");
        assert!(motors.set_motors(DriveCommand::STOP).await.is_err());

        assert_eq!(
            mock.get_commands(),
            vec![DriveCommand::new(1, 2), DriveCommand::STOP]
        );
    }

    #[tokio::test]
    async fn test_boxed_output_forwards() {
        let mock = MockMotors::new();
        let mut boxed: Box<dyn MotorOutput> = Box::new(mock.clone());

        boxed.set_motors(DriveCommand::new(5, 6)).await.unwrap();
        assert_eq!(mock.last_command(), Some(DriveCommand::new(5, 6)));
    }
}
