use anyhow::Result;

pub mod catalog;
pub mod matrix;

pub trait Command {
    fn run(&self) -> Result<()>;
}
