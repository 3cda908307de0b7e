use rep_core::ParamSchema;
use rep_models::Registry;
use rep_solve::BackendKind;

pub fn print(registry: &Registry) {
    println!("datasets:");
    for name in registry.dataset_names() {
        if let Ok(generator) = registry.dataset(name) {
            println!("  {name}");
            print_schema(&generator.schema());
        }
    }
    println!("models:");
    for name in registry.model_names() {
        if let Ok(entry) = registry.model(name) {
            let backends: Vec<&str> = entry.backends().iter().map(BackendKind::as_str).collect();
            println!("  {name} (solvers: {})", backends.join(", "));
            print_schema(entry.schema());
        }
    }
    println!("solvers:");
    for backend in BackendKind::all() {
        let mode = if backend.is_iterative() {
            "iterative"
        } else {
            "batch"
        };
        println!("  {backend} ({mode})");
        print_schema(&backend.schema());
    }
}

fn print_schema(schema: &ParamSchema) {
    for spec in &schema.specs {
        println!(
            "    {}: {} = {}  {}",
            spec.name, spec.kind, spec.default, spec.help
        );
    }
}
