// ─── Core ───
// Install and launch engine for Minecraft instances.
//
//   version/      version list, manifests, rules, inheritance resolver
//   remap/        ARM64 macOS library substitutions
//   downloader/   bounded, SHA-1 validated downloads with mirror fallback
//   assets/       asset index objects
//   loaders/      Fabric, Forge and NeoForge installers
//   install/      staged install tasks and the vanilla pipeline
//   launch/       classpath, arguments, game process
//   instance/     directory layout and configuration
//   java/         Java runtime detection

pub mod assets;
pub mod auth;
pub mod downloader;
pub mod error;
pub mod guard;
pub mod http;
pub mod install;
pub mod instance;
pub mod java;
pub mod launch;
pub mod loaders;
pub mod maven;
pub mod remap;
pub mod version;
