use anyhow::Result;
use lightshafts_wgpu::passes::light_shafts::expected_filter_ops;
use lightshafts_wgpu::{build_filter_commands, ColorPrecision, CommandList, FilterCommand, LightShaftsSettings, TargetId};

use crate::cli::SettingsArgs;

pub fn run(args: SettingsArgs) -> Result<()> {
    let settings = args.resolve()?;
    let mut list = CommandList::new();
    build_filter_commands(&settings, Some(TargetId::BufferA), &mut list);
    list.validate()?;

    print!("{}", describe(&settings, &list));
    debug_assert_eq!(list.filter_op_count(), expected_filter_ops(&settings));
    Ok(())
}

pub fn describe(settings: &LightShaftsSettings, list: &CommandList) -> String {
    let precision = match settings.color_precision() {
        ColorPrecision::Reduced => "reduced",
        ColorPrecision::ExtendedFloat => "extended float",
    };
    let mut out = format!(
        "working buffers: 1/{} resolution, {precision} precision\n",
        1u64 << settings.downsamples.min(63)
    );

    let mut depth = 0usize;
    for command in list.commands() {
        if matches!(command, FilterCommand::EndScope) {
            depth = depth.saturating_sub(1);
        }
        let indent = "  ".repeat(depth);
        let line = match command {
            FilterCommand::BeginScope(name) => format!("begin {name}"),
            FilterCommand::EndScope => "end".to_string(),
            FilterCommand::Clear { target, color } => format!("clear {} {color:?}", target.label()),
            FilterCommand::SetGlobalFloat { name, value } => format!("set {} = {value}", name.shader_name()),
            FilterCommand::Blit { src, dst, pass } => match pass {
                Some(p) => format!("blit {} -> {} [{}]", src.label(), dst.label(), p.entry_point()),
                None => format!("blit {} -> {}", src.label(), dst.label()),
            },
        };
        out.push_str(&indent);
        out.push_str(&line);
        out.push('\n');
        if matches!(command, FilterCommand::BeginScope(_)) {
            depth += 1;
        }
    }
    out.push_str(&format!("{} filter ops\n", list.filter_op_count()));
    out
}
