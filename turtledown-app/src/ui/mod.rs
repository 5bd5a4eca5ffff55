mod help;
mod hud;
