use gpu_arith::{opencl, Access, Context, GPUResult};

pub fn main() -> GPUResult<()> {
    // Use the first device of the first platform.
    let platforms = opencl::list_platforms()?;
    let platform = &platforms[0];
    let device = platform.device(0)?;
    println!("Running on {} ({})", device.name()?, device.kind()?);

    const LENGTH: usize = 10;
    let aa: Vec<i32> = (0..LENGTH as i32).collect();
    let bb: Vec<i32> = (0..LENGTH as i32).map(|i| LENGTH as i32 - i).collect();

    let context = Context::from_device(platform, device)?;

    // Copy the data to the GPU.
    let aa_buffer = context.create_buffer(Access::ReadOnly, &aa)?;
    let bb_buffer = context.create_buffer(Access::ReadOnly, &bb)?;
    let mut result_buffer = context.create_buffer(Access::WriteOnly, &[0i32; LENGTH])?;

    context.add(&aa_buffer, &bb_buffer, &mut result_buffer)?;

    // Get the resulting data.
    let mut result = Vec::new();
    result_buffer.read_into_vec(&mut result)?;
    for value in result {
        println!("{}", value);
    }

    Ok(())
}
