use arcstr::ArcStr;
use isolink::{
  full_link, AssignedGlobalsAnalyzer, ImportedState, InputFile, InstallOptions, LinkOptions,
  PackageDep,
};
use isolink_buildmessage as buildmessage;
use isolink_error::SourceParseError;
use rustc_hash::FxHashSet;

struct NoGlobals;

impl AssignedGlobalsAnalyzer for NoGlobals {
  fn find_assigned_globals(
    &self,
    _source: &str,
    _content_hash: &str,
  ) -> Result<FxHashSet<String>, SourceParseError> {
    Ok(FxHashSet::default())
  }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
  let install_options = InstallOptions::extensions(&[".js"]);
  let options = LinkOptions {
    input_files: vec![InputFile {
      source: "exports.greet = () => \"hi\";\n".into(),
      source_path: ArcStr::from("lib/greet.js"),
      serve_path: ArcStr::from("/packages/greeter/lib/greet.js"),
      abs_module_id: Some(ArcStr::from("/lib/greet.js")),
      imported: ImportedState::Static,
      install_options: Some(install_options),
      ..InputFile::default()
    }],
    bundle_arch: ArcStr::from("os"),
    combined_serve_path: ArcStr::from("/packages/greeter.js"),
    name: Some(ArcStr::from("greeter")),
    deps: vec![PackageDep::ordered("meteor")],
    ..LinkOptions::default()
  };

  let (outputs, messages) = buildmessage::capture("linking greeter", || async {
    full_link(options, &NoGlobals).await.map_err(|errors| anyhow::anyhow!(errors.to_string()))
  })
  .await?;

  print!("{}", messages.format_messages());
  for output in outputs {
    println!("==> {}\n{}", output.serve_path, output.source);
  }
  Ok(())
}
